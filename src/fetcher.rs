// Fetches result and detail pages from finn.no and hands them to the parsers.

use std::time::Duration;

use futures::{StreamExt, stream};
use reqwest::Client;
use tokio::time::sleep; // For retry delays
use url::Url;

use crate::{
    config::Settings,
    error::FetchError,
    models::{CarDetail, CarRecord},
    parser,
};

/// Shared client carrying the browser-like user agent and the request timeout.
pub fn build_client(settings: &Settings) -> reqwest::Result<Client> {
    Client::builder()
        .user_agent(settings.user_agent.as_str())
        .timeout(Duration::from_secs(settings.request_timeout_secs))
        .build()
}

/// URL of result page `page` (1-based). Page 1 is the search URL itself, later
/// pages add a `page` query parameter.
pub fn page_url(url: &str, page: u32) -> Result<Url, FetchError> {
    let mut parsed = Url::parse(url).map_err(|source| FetchError::InvalidUrl {
        url: url.to_string(),
        source,
    })?;
    if page >= 2 {
        parsed.query_pairs_mut().append_pair("page", &page.to_string());
    }
    Ok(parsed)
}

async fn get_text(client: &Client, url: Url) -> reqwest::Result<String> {
    client.get(url).send().await?.error_for_status()?.text().await
}

// Fetches a single page, retrying with exponential back-off when configured
async fn fetch_page_html(client: &Client, settings: &Settings, url: Url) -> Result<String, FetchError> {
    let attempts = settings.fetch_retries + 1;
    let mut retry_delay = Duration::from_millis(settings.retry_delay_ms);
    let mut attempt = 0;

    loop {
        attempt += 1;
        tracing::debug!(url = %url, attempt, "Fetch attempt {}/{}", attempt, attempts);

        match get_text(client, url.clone()).await {
            Ok(body) => {
                tracing::debug!(url = %url, attempt, bytes = body.len(), "Fetched page");
                return Ok(body);
            }
            Err(e) if attempt < attempts => {
                tracing::warn!(url = %url, attempt, status = ?e.status(), error = %e, "Fetch failed. Retrying...");
                sleep(retry_delay).await;
                retry_delay *= 2;
            }
            Err(source) => {
                return Err(FetchError::Request {
                    url: url.to_string(),
                    source,
                });
            }
        }
    }
}

/// Fetches up to `max_pages` result pages (capped by `settings.max_pages`) and
/// parses every page in order. Ids are renumbered 1..N over the whole fetch.
///
/// A failure on the first page is returned as an error. A failure on a later page
/// stops pagination and keeps what was already collected.
pub async fn fetch_listings(
    client: &Client,
    settings: &Settings,
    url: &str,
    max_pages: u32,
) -> Result<Vec<CarRecord>, FetchError> {
    let pages = max_pages.clamp(1, settings.max_pages.max(1));
    let urls = (1..=pages).map(|page| page_url(url, page)).collect::<Result<Vec<_>, _>>()?;
    let reference_year = settings.reference_year();

    tracing::info!(url, pages, "Starting listing fetch");

    let mut responses = stream::iter(urls.into_iter().zip(1u32..))
        .map(|(target, page)| async move { (page, fetch_page_html(client, settings, target).await) })
        .buffered(settings.page_concurrency.max(1));

    let mut all_cars = Vec::new();
    while let Some((page, result)) = responses.next().await {
        match result {
            Ok(html) => {
                let cars = parser::parse_listings_with_base(&html, reference_year, &settings.base_url);
                tracing::info!(page, count = cars.len(), "Parsed result page");
                all_cars.extend(cars);
            }
            Err(e) if page == 1 => return Err(e),
            Err(e) => {
                tracing::warn!(page, error = %e, "Stopping pagination, keeping {} listings", all_cars.len());
                break;
            }
        }
    }

    for (index, car) in all_cars.iter_mut().enumerate() {
        car.id = index as u32 + 1;
    }

    tracing::info!(url, count = all_cars.len(), "Listing fetch complete");
    Ok(all_cars)
}

/// Fetches a single listing page and extracts its details.
pub async fn fetch_car_detail(client: &Client, settings: &Settings, url: &str) -> Result<CarDetail, FetchError> {
    let target = page_url(url, 1)?;
    let html = fetch_page_html(client, settings, target).await?;
    Ok(parser::parse_car_detail(&html, url))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::parser::listing::tests::{listing_html, results_page};
    use wiremock::{
        Mock, MockServer, ResponseTemplate,
        matchers::{method, path, query_param, query_param_is_missing},
    };

    const SEARCH_PATH: &str = "/mobility/search/car";

    fn test_settings() -> Settings {
        Settings {
            request_timeout_secs: 5,
            retry_delay_ms: 1,
            reference_year: Some(2025),
            ..Settings::default()
        }
    }

    fn search_url(server: &MockServer) -> String {
        format!("{}{}?registration_class=1", server.uri(), SEARCH_PATH)
    }

    async fn mount_page(server: &MockServer, page: Option<&str>, body: String) {
        let mock = Mock::given(method("GET")).and(path(SEARCH_PATH));
        let mock = match page {
            Some(n) => mock.and(query_param("page", n)),
            None => mock.and(query_param_is_missing("page")),
        };
        mock.respond_with(ResponseTemplate::new(200).set_body_string(body)).mount(server).await;
    }

    #[test]
    fn later_pages_append_page_parameter() {
        let base = "https://www.finn.no/mobility/search/car?registration_class=1";
        assert_eq!(page_url(base, 1).unwrap().as_str(), base);
        assert_eq!(
            page_url(base, 3).unwrap().as_str(),
            "https://www.finn.no/mobility/search/car?registration_class=1&page=3"
        );
        assert!(matches!(page_url("not a url", 1), Err(FetchError::InvalidUrl { .. })));
    }

    #[tokio::test]
    async fn concatenates_pages_in_order_and_renumbers_ids() {
        let server = MockServer::start().await;
        mount_page(
            &server,
            None,
            results_page(&[
                listing_html(Some("Audi A4"), "/a", "2019 ∙ 80 000 km", "200 000 kr"),
                listing_html(Some("BMW 320d"), "/b", "2020 ∙ 60 000 km", "Solgt"),
            ]),
        )
        .await;
        mount_page(
            &server,
            Some("2"),
            results_page(&[listing_html(Some("Volvo V60"), "/c", "2018 ∙ 120 000 km", "180 000 kr")]),
        )
        .await;

        let settings = Settings { page_concurrency: 2, ..test_settings() };
        let client = build_client(&settings).unwrap();
        let cars = fetch_listings(&client, &settings, &search_url(&server), 2).await.unwrap();

        let summary: Vec<_> = cars.iter().map(|c| (c.id, c.name.as_str())).collect();
        assert_eq!(summary, vec![(1, "Audi A4"), (2, "BMW 320d"), (3, "Volvo V60")]);
        assert_eq!(cars[2].link.as_deref(), Some("https://www.finn.no/c"));
        assert_eq!(cars[2].age, Some(7));
    }

    #[tokio::test]
    async fn later_page_failure_keeps_earlier_pages() {
        let server = MockServer::start().await;
        mount_page(
            &server,
            None,
            results_page(&[listing_html(Some("Audi A4"), "/a", "2019 ∙ 80 000 km", "200 000 kr")]),
        )
        .await;
        Mock::given(method("GET"))
            .and(path(SEARCH_PATH))
            .and(query_param("page", "2"))
            .respond_with(ResponseTemplate::new(503))
            .mount(&server)
            .await;

        let settings = test_settings();
        let client = build_client(&settings).unwrap();
        let cars = fetch_listings(&client, &settings, &search_url(&server), 3).await.unwrap();
        assert_eq!(cars.len(), 1);
        assert_eq!(cars[0].name, "Audi A4");
    }

    #[tokio::test]
    async fn first_page_failure_is_an_error() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path(SEARCH_PATH))
            .respond_with(ResponseTemplate::new(404))
            .mount(&server)
            .await;

        let settings = test_settings();
        let client = build_client(&settings).unwrap();
        let err = fetch_listings(&client, &settings, &search_url(&server), 1).await.unwrap_err();
        assert_eq!(err.status(), Some(reqwest::StatusCode::NOT_FOUND));
    }

    #[tokio::test]
    async fn page_count_is_capped_by_settings() {
        let server = MockServer::start().await;
        mount_page(
            &server,
            None,
            results_page(&[listing_html(Some("Audi A4"), "/a", "2019 ∙ 80 000 km", "200 000 kr")]),
        )
        .await;
        Mock::given(method("GET"))
            .and(path(SEARCH_PATH))
            .and(query_param("page", "2"))
            .respond_with(ResponseTemplate::new(200))
            .expect(0)
            .mount(&server)
            .await;

        let settings = Settings { max_pages: 1, ..test_settings() };
        let client = build_client(&settings).unwrap();
        let cars = fetch_listings(&client, &settings, &search_url(&server), 5).await.unwrap();
        assert_eq!(cars.len(), 1);
    }

    #[tokio::test]
    async fn retries_transient_failures() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path(SEARCH_PATH))
            .respond_with(ResponseTemplate::new(500))
            .up_to_n_times(1)
            .mount(&server)
            .await;
        mount_page(
            &server,
            None,
            results_page(&[listing_html(Some("Audi A4"), "/a", "2019 ∙ 80 000 km", "200 000 kr")]),
        )
        .await;

        let settings = Settings { fetch_retries: 2, ..test_settings() };
        let client = build_client(&settings).unwrap();
        let cars = fetch_listings(&client, &settings, &search_url(&server), 1).await.unwrap();
        assert_eq!(cars.len(), 1);
    }

    #[tokio::test]
    async fn fetches_and_parses_detail_page() {
        let server = MockServer::start().await;
        let html = r#"<html><body><main>
            <h1>Tesla Model 3 Long Range</h1>
            <section><h2>Spesifikasjoner</h2>
              <dl><dt>Girkasse</dt><dd>Automat</dd><dt>Drivstoff</dt><dd>Elektrisitet</dd></dl>
            </section>
            </main></body></html>"#;
        Mock::given(method("GET"))
            .and(path("/mobility/item/42"))
            .respond_with(ResponseTemplate::new(200).set_body_string(html))
            .mount(&server)
            .await;

        let settings = test_settings();
        let client = build_client(&settings).unwrap();
        let url = format!("{}/mobility/item/42", server.uri());
        let detail = fetch_car_detail(&client, &settings, &url).await.unwrap();

        assert_eq!(detail.url, url);
        assert_eq!(detail.title.as_deref(), Some("Tesla Model 3 Long Range"));
        assert_eq!(detail.specifications.get("Girkasse").map(String::as_str), Some("Automat"));
    }
}
