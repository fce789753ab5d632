use super::http_client_factory::HttpClientFactory;
use crate::domain::errors::FetchError;
use crate::domain::market::series::{PriceBar, Series};
use crate::domain::ports::MarketDataProvider;
use async_trait::async_trait;
use chrono::{DateTime, NaiveDate, Utc};
use reqwest::{Client, StatusCode};
use serde::Deserialize;
use tracing::{debug, info};
use url::Url;

const DEFAULT_BASE_URL: &str = "https://query1.finance.yahoo.com";

/// Daily history from the Yahoo Finance chart API (v8).
pub struct YahooMarketDataProvider {
    client: Client,
    base_url: String,
}

impl YahooMarketDataProvider {
    pub fn new() -> Self {
        Self::with_base_url(DEFAULT_BASE_URL)
    }

    pub fn with_base_url(base_url: &str) -> Self {
        Self {
            client: HttpClientFactory::create_client(),
            base_url: base_url.trim_end_matches('/').to_string(),
        }
    }

    fn chart_url(&self, symbol: &str) -> Result<Url, FetchError> {
        let malformed = |reason: String| FetchError::MalformedResponse {
            symbol: symbol.to_string(),
            reason,
        };

        let mut url = Url::parse(&self.base_url).map_err(|e| malformed(e.to_string()))?;
        url.path_segments_mut()
            .map_err(|_| malformed(format!("{} cannot be a base URL", self.base_url)))?
            .pop_if_empty()
            .extend(["v8", "finance", "chart", symbol]);
        url.query_pairs_mut()
            .append_pair("interval", "1d")
            .append_pair("period1", "0")
            .append_pair("period2", &Utc::now().timestamp().to_string())
            .append_pair("includeAdjustedClose", "true")
            .append_pair("events", "div,split");
        Ok(url)
    }
}

impl Default for YahooMarketDataProvider {
    fn default() -> Self {
        Self::new()
    }
}

#[derive(Debug, Deserialize)]
struct ChartEnvelope {
    chart: ChartBody,
}

#[derive(Debug, Deserialize)]
struct ChartBody {
    result: Option<Vec<ChartResult>>,
    error: Option<ChartErrorBody>,
}

#[derive(Debug, Deserialize)]
struct ChartErrorBody {
    code: String,
    description: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ChartResult {
    meta: Option<ChartMeta>,
    #[serde(default)]
    timestamp: Vec<i64>,
    indicators: Indicators,
}

#[derive(Debug, Deserialize)]
struct ChartMeta {
    #[serde(default)]
    gmtoffset: i64,
    symbol: Option<String>,
}

#[derive(Debug, Deserialize)]
struct Indicators {
    #[serde(default)]
    quote: Vec<Quote>,
    #[serde(default)]
    adjclose: Vec<AdjClose>,
}

#[derive(Debug, Default, Deserialize)]
struct Quote {
    #[serde(default)]
    open: Vec<Option<f64>>,
    #[serde(default)]
    high: Vec<Option<f64>>,
    #[serde(default)]
    low: Vec<Option<f64>>,
    #[serde(default)]
    close: Vec<Option<f64>>,
    #[serde(default)]
    volume: Vec<Option<f64>>,
}

#[derive(Debug, Default, Deserialize)]
struct AdjClose {
    #[serde(default)]
    adjclose: Vec<Option<f64>>,
}

fn value_at(values: &[Option<f64>], i: usize) -> f64 {
    values.get(i).copied().flatten().unwrap_or(f64::NAN)
}

fn trading_date(timestamp: i64, gmtoffset: i64) -> Option<NaiveDate> {
    DateTime::from_timestamp(timestamp + gmtoffset, 0).map(|dt| dt.date_naive())
}

/// Converts a chart API body into a series. Missing quotes become NaN so the
/// windower can skip them.
pub(crate) fn parse_chart(symbol: &str, body: &str) -> Result<Series, FetchError> {
    let envelope: ChartEnvelope =
        serde_json::from_str(body).map_err(|e| FetchError::MalformedResponse {
            symbol: symbol.to_string(),
            reason: e.to_string(),
        })?;

    if let Some(error) = envelope.chart.error {
        if error.code.eq_ignore_ascii_case("Not Found") {
            return Err(FetchError::UnknownSymbol {
                symbol: symbol.to_string(),
            });
        }
        return Err(FetchError::MalformedResponse {
            symbol: symbol.to_string(),
            reason: format!(
                "{}: {}",
                error.code,
                error.description.unwrap_or_default()
            ),
        });
    }

    let result = envelope
        .chart
        .result
        .and_then(|mut results| results.pop())
        .ok_or_else(|| FetchError::UnknownSymbol {
            symbol: symbol.to_string(),
        })?;

    let gmtoffset = result.meta.as_ref().map(|m| m.gmtoffset).unwrap_or(0);
    let resolved_symbol = result
        .meta
        .and_then(|m| m.symbol)
        .unwrap_or_else(|| symbol.to_string());

    let mut indicators = result.indicators;
    let quote = indicators.quote.pop().unwrap_or_default();
    let adjclose = indicators.adjclose.pop().unwrap_or_default().adjclose;

    let mut bars = Vec::with_capacity(result.timestamp.len());
    for (i, ts) in result.timestamp.iter().enumerate() {
        let date = trading_date(*ts, gmtoffset).ok_or_else(|| FetchError::MalformedResponse {
            symbol: symbol.to_string(),
            reason: format!("timestamp {} out of range", ts),
        })?;
        let close = value_at(&quote.close, i);
        bars.push(PriceBar {
            date,
            open: value_at(&quote.open, i),
            high: value_at(&quote.high, i),
            low: value_at(&quote.low, i),
            close,
            // Without an adjusted series the close is used as is
            adjclose: if adjclose.is_empty() {
                close
            } else {
                value_at(&adjclose, i)
            },
            volume: value_at(&quote.volume, i),
        });
    }

    Ok(Series::from_bars(&resolved_symbol, &bars))
}

#[async_trait]
impl MarketDataProvider for YahooMarketDataProvider {
    async fn fetch_daily_series(&self, symbol: &str) -> Result<Series, FetchError> {
        let url = self.chart_url(symbol)?;
        debug!("YahooMarketDataProvider: GET {}", url);

        let response = self
            .client
            .get(url)
            .send()
            .await
            .map_err(|e| FetchError::Http {
                symbol: symbol.to_string(),
                source: e,
            })?;

        let status = response.status();
        if status == StatusCode::NOT_FOUND {
            return Err(FetchError::UnknownSymbol {
                symbol: symbol.to_string(),
            });
        }
        if !status.is_success() {
            return Err(FetchError::Status {
                symbol: symbol.to_string(),
                status: status.as_u16(),
            });
        }

        let body = response.text().await.map_err(|e| FetchError::Http {
            symbol: symbol.to_string(),
            source: e,
        })?;
        let series = parse_chart(symbol, &body)?;

        info!(
            "YahooMarketDataProvider: {} daily rows for {}",
            series.len(),
            symbol
        );
        Ok(series)
    }

    fn name(&self) -> &str {
        "Yahoo Finance"
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const SAMPLE: &str = r#"{
        "chart": {
            "result": [{
                "meta": {"symbol": "TSLA", "gmtoffset": -14400},
                "timestamp": [1704205800, 1704292200, 1704378600],
                "indicators": {
                    "quote": [{
                        "open": [250.08, 244.98, null],
                        "high": [251.25, 245.68, 242.7],
                        "low": [244.41, 236.32, 237.73],
                        "close": [248.42, 238.45, 237.93],
                        "volume": [104654200, 121082600, 102629300]
                    }],
                    "adjclose": [{"adjclose": [248.42, 238.45, 237.93]}]
                }
            }],
            "error": null
        }
    }"#;

    #[test]
    fn test_parse_chart() {
        let series = parse_chart("tsla", SAMPLE).unwrap();

        assert_eq!(series.symbol(), Some("TSLA"));
        assert_eq!(series.len(), 3);
        assert_eq!(
            series.dates()[0],
            NaiveDate::from_ymd_opt(2024, 1, 2).unwrap()
        );
        assert_eq!(series.column("adjclose").unwrap()[1], 238.45);
        assert_eq!(series.column("volume").unwrap()[2], 102629300.0);
        assert!(series.column("open").unwrap()[2].is_nan());
    }

    #[test]
    fn test_parse_not_found() {
        let body = r#"{"chart":{"result":null,"error":{"code":"Not Found","description":"No data found, symbol may be delisted"}}}"#;
        let err = parse_chart("NOPE", body).unwrap_err();
        assert!(matches!(err, FetchError::UnknownSymbol { symbol } if symbol == "NOPE"));
    }

    #[test]
    fn test_parse_garbage() {
        let err = parse_chart("TSLA", "<html>").unwrap_err();
        assert!(matches!(err, FetchError::MalformedResponse { .. }));
    }

    #[test]
    fn test_chart_url() {
        let provider = YahooMarketDataProvider::with_base_url("http://localhost:9000/");
        let url = provider.chart_url("GBP=X").unwrap();
        assert!(url.as_str().starts_with("http://localhost:9000/v8/finance/chart/GBP=X?"));
        assert!(url.as_str().contains("interval=1d"));
    }
}
