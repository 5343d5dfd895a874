use crate::config::Endpoints;
use crate::error::LoadError;
use crate::models::{Collection, Page, Product, User};
use reqwest::{Client, Url};

/// A fetch tagged with the generation it was issued under.
#[derive(Clone, Debug, PartialEq)]
pub struct FetchRequest {
    pub generation: u64,
    pub page: Page,
    pub query: Option<String>,
}

#[derive(Debug)]
pub struct FetchResponse {
    pub generation: u64,
    pub page: Page,
    pub result: Result<Collection, LoadError>,
}

pub fn collection_url(
    endpoints: &Endpoints,
    page: Page,
    query: Option<&str>,
) -> Result<Url, LoadError> {
    let (base, path) = match page {
        Page::Users => (&endpoints.users, "users"),
        Page::Products => (&endpoints.products, "products"),
        Page::Home => return Err(LoadError::NoEndpoint(page.title())),
    };
    let raw = format!("{}/{}", base.trim_end_matches('/'), path);
    let mut url = Url::parse(&raw).map_err(|err| LoadError::Url {
        url: raw.clone(),
        reason: err.to_string(),
    })?;

    // An empty query must not leave a dangling '?'
    if let Some(q) = query.map(str::trim).filter(|q| !q.is_empty()) {
        url.query_pairs_mut().append_pair("q", q);
    }
    Ok(url)
}

/// Parse a collection body for `page`. Users always start without tasks.
pub fn parse_collection(page: Page, body: &str) -> Result<Collection, LoadError> {
    match page {
        Page::Users => {
            let mut users: Vec<User> = serde_json::from_str(body)?;
            for user in &mut users {
                user.tasks.clear();
            }
            Ok(Collection::Users(users))
        }
        Page::Products => {
            let products: Vec<Product> = serde_json::from_str(body)?;
            Ok(Collection::Products(products))
        }
        Page::Home => Err(LoadError::NoEndpoint(page.title())),
    }
}

pub async fn fetch_collection(
    client: &Client,
    endpoints: &Endpoints,
    page: Page,
    query: Option<&str>,
) -> Result<Collection, LoadError> {
    let url = collection_url(endpoints, page, query)?;
    tracing::debug!("GET {}", url);

    let body = client
        .get(url)
        .send()
        .await?
        .error_for_status()?
        .text()
        .await?;

    parse_collection(page, &body)
}

pub async fn run_fetch(
    client: Client,
    endpoints: Endpoints,
    request: FetchRequest,
) -> FetchResponse {
    let result = fetch_collection(
        &client,
        &endpoints,
        request.page,
        request.query.as_deref(),
    )
    .await;
    FetchResponse {
        generation: request.generation,
        page: request.page,
        result,
    }
}
