//! `PriceFeed` over HTTP GET (§6, "Price feed"): `ids=<csv>` query param,
//! response either `{data: {<mint>: {usd_price}}}` or a flat
//! `{<mint>: <number>|{...}}` map, with a field-name fallback chain for
//! whichever price key the counterparty happened to use.

use std::collections::HashMap;
use std::time::Duration;

use async_trait::async_trait;
use serde_json::Value;
use types::ErrorKind;

const PRICE_FIELD_FALLBACKS: &[&str] = &["usd_price", "price", "price_usd", "value"];

pub struct HttpPriceFeed {
    client: reqwest::Client,
    base_url: String,
}

impl HttpPriceFeed {
    pub fn new(base_url: impl Into<String>) -> Self {
        Self {
            client: reqwest::Client::new(),
            base_url: base_url.into(),
        }
    }
}

#[async_trait]
impl ports::PriceFeed for HttpPriceFeed {
    async fn get_prices_usd(
        &self,
        mints: &[String],
        deadline: Duration,
    ) -> Result<HashMap<String, f64>, ErrorKind> {
        if mints.is_empty() {
            return Ok(HashMap::new());
        }

        let url = format!("{}?ids={}", self.base_url, mints.join(","));
        let response = tokio::time::timeout(deadline, self.client.get(&url).send())
            .await
            .map_err(|_| ErrorKind::PriceFeedUnavailable("request timed out".to_string()))?
            .map_err(|err| ErrorKind::PriceFeedUnavailable(err.to_string()))?;

        let body: Value = response
            .json()
            .await
            .map_err(|err| ErrorKind::PriceFeedUnavailable(err.to_string()))?;

        Ok(extract_prices(&body, mints))
    }
}

fn extract_prices(body: &Value, mints: &[String]) -> HashMap<String, f64> {
    let data = body.get("data").unwrap_or(body);
    let mut prices = HashMap::new();
    for mint in mints {
        if let Some(entry) = data.get(mint) {
            if let Some(price) = price_from_entry(entry) {
                prices.insert(mint.clone(), price);
            }
        }
    }
    prices
}

fn price_from_entry(entry: &Value) -> Option<f64> {
    if let Some(flat) = entry.as_f64() {
        return Some(flat);
    }
    PRICE_FIELD_FALLBACKS
        .iter()
        .find_map(|key| entry.get(key).and_then(Value::as_f64))
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn extracts_from_nested_data_shape_with_usd_price() {
        let body = json!({ "data": { "MINT1": { "usd_price": 1.23 } } });
        let prices = extract_prices(&body, &["MINT1".to_string()]);
        assert_eq!(prices["MINT1"], 1.23);
    }

    #[test]
    fn falls_back_across_price_field_names() {
        for field in PRICE_FIELD_FALLBACKS {
            let mut entry = serde_json::Map::new();
            entry.insert((*field).to_string(), json!(4.56));
            let mut data = serde_json::Map::new();
            data.insert("MINT1".to_string(), Value::Object(entry));
            let mut body = serde_json::Map::new();
            body.insert("data".to_string(), Value::Object(data));

            let prices = extract_prices(&Value::Object(body), &["MINT1".to_string()]);
            assert_eq!(prices["MINT1"], 4.56, "field {field} should be recognized");
        }
    }

    #[test]
    fn accepts_flat_map_without_data_wrapper() {
        let body = json!({ "MINT1": 7.89 });
        let prices = extract_prices(&body, &["MINT1".to_string()]);
        assert_eq!(prices["MINT1"], 7.89);
    }

    #[test]
    fn missing_mint_is_simply_absent_from_the_result() {
        let body = json!({ "data": {} });
        let prices = extract_prices(&body, &["MINT1".to_string()]);
        assert!(!prices.contains_key("MINT1"));
    }
}
