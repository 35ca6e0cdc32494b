//! TWSE listed-company profile adapter (sector labels).

use async_trait::async_trait;
use serde_json::{Map, Value};
use tracing::{info, warn};
use twscan_common::config::HttpConfig;

use super::http::HttpFetcher;
use super::provider::{ProviderError, SectorInfoProvider};
use super::twse::OPENAPI_BASE_URL;
use super::SectorMap;

/// Listed-company basic profile
const COMPANY_PROFILE_PATH: &str = "/v1/opendata/t187ap03_L";

/// Translate a TWSE industry code (產業別) to its label.
///
/// Unknown codes yield `None`; callers keep the raw code in that case.
pub fn industry_label(code: &str) -> Option<&'static str> {
    let label = match code.trim() {
        "01" => "水泥工業",
        "02" => "食品工業",
        "03" => "塑膠工業",
        "04" => "紡織纖維",
        "05" => "電機機械",
        "06" => "電器電纜",
        "08" => "玻璃陶瓷",
        "09" => "造紙工業",
        "10" => "鋼鐵工業",
        "11" => "橡膠工業",
        "12" => "汽車工業",
        "14" => "建材營造",
        "15" => "航運業",
        "16" => "觀光餐旅",
        "17" => "金融保險",
        "18" => "貿易百貨",
        "20" => "其他",
        "21" => "化學工業",
        "22" => "生技醫療業",
        "23" => "油電燃氣業",
        "24" => "半導體業",
        "25" => "電腦及週邊設備業",
        "26" => "光電業",
        "27" => "通信網路業",
        "28" => "電子零組件業",
        "29" => "電子通路業",
        "30" => "資訊服務業",
        "31" => "其他電子業",
        "32" => "文化創意業",
        "33" => "農業科技業",
        "35" => "綠能環保",
        "36" => "數位雲端",
        "37" => "運動休閒",
        "38" => "居家生活",
        _ => return None,
    };
    Some(label)
}

fn text(row: &Map<String, Value>, key: &str) -> Option<String> {
    row.get(key)
        .and_then(Value::as_str)
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(str::to_string)
}

/// Build the code → label map from profile rows.
fn parse_profiles(rows: &[Map<String, Value>]) -> SectorMap {
    rows.iter()
        .filter_map(|row| {
            let code = text(row, "公司代號")?;
            let industry = text(row, "產業別")?;
            let label = industry_label(&industry)
                .map(str::to_string)
                .unwrap_or(industry);
            Some((code, label))
        })
        .collect()
}

/// Sector provider backed by the TWSE company profile.
///
/// Never fails: any fetch or parse problem degrades to an empty map, which
/// puts every instrument in the "Unknown" sector.
pub struct TwseSectorProvider {
    http: HttpFetcher,
    base_url: String,
}

impl TwseSectorProvider {
    pub fn new(config: &HttpConfig) -> Self {
        Self {
            http: HttpFetcher::new(config),
            base_url: OPENAPI_BASE_URL.to_string(),
        }
    }

    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into();
        self
    }
}

#[async_trait]
impl SectorInfoProvider for TwseSectorProvider {
    fn name(&self) -> &'static str {
        "twse-profile"
    }

    async fn fetch_sector_map(&self) -> Result<SectorMap, ProviderError> {
        let url = format!("{}{}", self.base_url, COMPANY_PROFILE_PATH);
        match self.http.get_json::<Vec<Map<String, Value>>>(&url, &[]).await
        {
            Ok(rows) => {
                let sectors = parse_profiles(&rows);
                info!(companies = sectors.len(), "Loaded sector assignments");
                Ok(sectors)
            }
            Err(e) => {
                warn!(error = %e, "Sector assignments unavailable, every code maps to Unknown");
                Ok(SectorMap::new())
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_industry_label() {
        assert_eq!(industry_label("24"), Some("半導體業"));
        assert_eq!(industry_label(" 01 "), Some("水泥工業"));
        assert_eq!(industry_label("99"), None);
    }

    #[test]
    fn test_parse_profiles() {
        let rows: Vec<Map<String, Value>> = serde_json::from_value(json!([
            { "公司代號": "2330", "公司簡稱": "台積電", "產業別": "24" },
            { "公司代號": "2603", "公司簡稱": "長榮", "產業別": "15" },
            { "公司代號": "9999", "公司簡稱": "測試", "產業別": "91" },
            { "公司代號": "1234", "公司簡稱": "缺漏", "產業別": "" }
        ]))
        .unwrap();

        let sectors = parse_profiles(&rows);
        assert_eq!(sectors.len(), 3);
        assert_eq!(sectors["2330"], "半導體業");
        assert_eq!(sectors["2603"], "航運業");
        assert_eq!(sectors["9999"], "91");
        assert!(!sectors.contains_key("1234"));
    }
}
