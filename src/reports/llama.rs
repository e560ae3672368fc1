//! DefiLlama REST client. Response shapes are normalised here, once, so report
//! code never probes raw JSON.

use std::collections::BTreeMap;

use serde::Deserialize;

use crate::fetch::FetchError;
use crate::http::ApiClient;

const LLAMA_API: &str = "https://api.llama.fi";

mod flexible {
    use serde::{Deserialize, Deserializer};

    #[derive(Deserialize)]
    #[serde(untagged)]
    enum NumberOrString {
        Int(i64),
        Float(f64),
        String(String),
    }

    pub fn f64_value<'de, D>(deserializer: D) -> Result<f64, D::Error>
    where
        D: Deserializer<'de>,
    {
        match NumberOrString::deserialize(deserializer)? {
            NumberOrString::Int(i) => Ok(i as f64),
            NumberOrString::Float(f) => Ok(f),
            NumberOrString::String(s) => s.trim().parse().map_err(serde::de::Error::custom),
        }
    }

    pub fn i64_value<'de, D>(deserializer: D) -> Result<i64, D::Error>
    where
        D: Deserializer<'de>,
    {
        match NumberOrString::deserialize(deserializer)? {
            NumberOrString::Int(i) => Ok(i),
            NumberOrString::Float(f) => Ok(f as i64),
            NumberOrString::String(s) => s.trim().parse().map_err(serde::de::Error::custom),
        }
    }
}

/// `[timestamp, value]` as used by DefiLlama chart arrays.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct PairPoint(
    #[serde(deserialize_with = "flexible::i64_value")] pub i64,
    #[serde(deserialize_with = "flexible::f64_value")] pub f64,
);

/// `{date, totalLiquidityUSD}` (protocol history) or `{date, tvl}` (chain history).
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct ObjectPoint {
    #[serde(deserialize_with = "flexible::i64_value")]
    pub date: i64,
    #[serde(
        rename = "totalLiquidityUSD",
        alias = "tvl",
        deserialize_with = "flexible::f64_value"
    )]
    pub value: f64,
}

/// One historical data point exactly as the API sent it.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(untagged)]
pub enum RawDataPoint {
    Pair(PairPoint),
    Object(ObjectPoint),
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct DataPoint {
    pub timestamp: i64,
    pub value: f64,
}

impl From<RawDataPoint> for DataPoint {
    fn from(raw: RawDataPoint) -> Self {
        match raw {
            RawDataPoint::Pair(PairPoint(timestamp, value)) => Self { timestamp, value },
            RawDataPoint::Object(ObjectPoint { date, value }) => Self {
                timestamp: date,
                value,
            },
        }
    }
}

/// Decodes a JSON array of mixed-shape points, dropping entries of neither shape.
pub fn decode_series(value: serde_json::Value) -> Result<Vec<DataPoint>, FetchError> {
    let items = match value {
        serde_json::Value::Array(items) => items,
        _ => return Err(FetchError::Decode("expected an array of data points".into())),
    };
    let mut points: Vec<DataPoint> = items
        .into_iter()
        .filter_map(|item| serde_json::from_value::<RawDataPoint>(item).ok())
        .map(DataPoint::from)
        .collect();
    points.sort_by_key(|p| p.timestamp);
    Ok(points)
}

#[derive(Debug, Deserialize)]
struct ChainTvlHistory {
    #[serde(default)]
    tvl: serde_json::Value,
}

#[derive(Debug, Deserialize)]
struct ProtocolResponse {
    #[serde(rename = "chainTvls", default)]
    chain_tvls: BTreeMap<String, ChainTvlHistory>,
}

#[derive(Debug, Deserialize)]
struct SummaryResponse {
    #[serde(rename = "total24h")]
    total_24h: Option<f64>,
}

pub struct LlamaClient<'a> {
    client: &'a ApiClient,
    base_url: String,
}

impl<'a> LlamaClient<'a> {
    pub fn new(client: &'a ApiClient) -> Self {
        Self {
            client,
            base_url: LLAMA_API.to_string(),
        }
    }

    /// Current TVL in USD.
    pub async fn protocol_tvl(&self, slug: &str) -> Result<f64, FetchError> {
        let value: serde_json::Value = self
            .client
            .get_json(&format!("{}/tvl/{slug}", self.base_url))
            .await?;
        value
            .as_f64()
            .ok_or_else(|| FetchError::Decode(format!("tvl for {slug} is not a number")))
    }

    pub async fn daily_fees(&self, slug: &str) -> Result<f64, FetchError> {
        let url = format!("{}/summary/fees/{slug}?dataType=dailyFees", self.base_url);
        let summary: SummaryResponse = self.client.get_json(&url).await?;
        summary.total_24h.ok_or(FetchError::Missing("total24h"))
    }

    pub async fn daily_volume(&self, slug: &str) -> Result<f64, FetchError> {
        let url = format!(
            "{}/summary/dexs/{slug}?excludeTotalDataChart=true&excludeTotalDataChartBreakdown=true",
            self.base_url
        );
        let summary: SummaryResponse = self.client.get_json(&url).await?;
        summary.total_24h.ok_or(FetchError::Missing("total24h"))
    }

    /// Historical TVL per chain, keyed by DefiLlama chain name.
    pub async fn protocol_chain_history(
        &self,
        slug: &str,
    ) -> Result<BTreeMap<String, Vec<DataPoint>>, FetchError> {
        let response: ProtocolResponse = self
            .client
            .get_json(&format!("{}/protocol/{slug}", self.base_url))
            .await?;
        let mut history = BTreeMap::new();
        for (chain, series) in response.chain_tvls {
            // Skip derived buckets such as "Ethereum-borrowed" or "staking".
            if chain.contains('-') || chain.eq_ignore_ascii_case("staking") {
                continue;
            }
            match decode_series(series.tvl) {
                Ok(points) => {
                    history.insert(chain, points);
                }
                Err(e) => log::debug!("[LlamaClient::protocol_chain_history] {chain}: {e}"),
            }
        }
        Ok(history)
    }
}

/// The point nearest `target`, preferring points no later than `target + tolerance`.
/// Ties go to the earlier point.
pub fn find_closest_data_point(
    points: &[DataPoint],
    target: i64,
    tolerance: i64,
) -> Option<&DataPoint> {
    match points {
        [] => None,
        [only] => Some(only),
        _ => {
            let limit = target.saturating_add(tolerance);
            nearest(points.iter().filter(|p| p.timestamp <= limit), target)
                .or_else(|| nearest(points.iter(), target))
        }
    }
}

fn nearest<'p>(
    candidates: impl Iterator<Item = &'p DataPoint>,
    target: i64,
) -> Option<&'p DataPoint> {
    candidates.fold(None, |best: Option<&'p DataPoint>, p| match best {
        Some(b) if diff(b, target) < diff(p, target) => Some(b),
        Some(b) if diff(b, target) == diff(p, target) && b.timestamp <= p.timestamp => Some(b),
        _ => Some(p),
    })
}

fn diff(point: &DataPoint, target: i64) -> u64 {
    point.timestamp.abs_diff(target)
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;

    fn point(timestamp: i64, value: f64) -> DataPoint {
        DataPoint { timestamp, value }
    }

    #[test]
    fn test_decodes_both_point_shapes() {
        let series = decode_series(json!([
            [1_700_086_400, 20.5],
            {"date": 1_700_000_000, "totalLiquidityUSD": 10.0},
            {"date": "1700172800", "tvl": "30"},
            {"unexpected": true}
        ]))
        .unwrap();
        assert_eq!(
            series,
            vec![
                point(1_700_000_000, 10.0),
                point(1_700_086_400, 20.5),
                point(1_700_172_800, 30.0),
            ]
        );
        assert!(decode_series(json!({"date": 1})).is_err());
    }

    #[test]
    fn test_raw_point_variants() {
        let pair: RawDataPoint = serde_json::from_value(json!([1, 2.0])).unwrap();
        assert_eq!(pair, RawDataPoint::Pair(PairPoint(1, 2.0)));
        let object: RawDataPoint =
            serde_json::from_value(json!({"date": 5, "totalLiquidityUSD": 1})).unwrap();
        assert_eq!(object, RawDataPoint::Object(ObjectPoint { date: 5, value: 1.0 }));
    }

    #[test]
    fn test_closest_point_empty_and_single() {
        assert_eq!(find_closest_data_point(&[], 100, 10), None);
        let only = [point(1, 5.0)];
        assert_eq!(find_closest_data_point(&only, 1_000_000, 10), Some(&only[0]));
    }

    #[test]
    fn test_closest_point_picks_minimal_diff() {
        let points = [point(100, 1.0), point(190, 2.0), point(230, 3.0)];
        assert_eq!(find_closest_data_point(&points, 200, 50).unwrap().value, 2.0);
    }

    #[test]
    fn test_closest_point_prefers_points_inside_window() {
        // 205 is nearer but beyond target + tolerance.
        let points = [point(150, 1.0), point(205, 2.0)];
        assert_eq!(find_closest_data_point(&points, 200, 2).unwrap().value, 1.0);
        // With nothing inside the window the overall nearest wins.
        let late = [point(300, 1.0), point(260, 2.0)];
        assert_eq!(find_closest_data_point(&late, 200, 10).unwrap().value, 2.0);
    }

    #[test]
    fn test_closest_point_tie_goes_to_earlier() {
        let points = [point(210, 2.0), point(190, 1.0)];
        assert_eq!(find_closest_data_point(&points, 200, 20).unwrap().value, 1.0);
    }
}
