//! Checks claims from a transcript against DefiLlama and CoinGecko.

use crate::error::{Error, Result};
use async_trait::async_trait;
use derive_more::Display;
use regex::Regex;
use reqwest::{Client, StatusCode};
use serde::Deserialize;
use serde_json::Value;
use std::sync::{Arc, LazyLock};
use std::time::{Duration, Instant};
use tokio::sync::Mutex;

const DEFILLAMA: &str = "defillama";
const COINGECKO: &str = "coingecko";

const TVL_TOLERANCE: f64 = 0.2;
const PRICE_TOLERANCE: f64 = 0.1;
const APY_TOLERANCE: f64 = 0.3;
const POOLS_CHECKED: usize = 10;
const POOLS_AVERAGED: usize = 5;
const POOLS_TTL: Duration = Duration::from_secs(60 * 60);

/// Tried in order; the first pattern with a match anywhere in the text wins.
static SCALED_NUMBERS: LazyLock<[(Regex, f64); 4]> = LazyLock::new(|| {
    let scaled = |suffixes: &str| {
        Regex::new(&format!(r"(\d+(?:\.\d+)?)\s*(?:{suffixes})\b")).unwrap()
    };
    [
        (scaled(r"billions?|bn|млрд\w*"), 1e9),
        (scaled(r"millions?|mln|mm|m|млн\w*"), 1e6),
        (scaled(r"thousands?|k|тыс\w*"), 1e3),
        (Regex::new(r"\d+(?:\.\d+)?").unwrap(), 1.0),
    ]
});
static PERCENTAGE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(\d+(?:\.\d+)?)\s*(?:%|percent|процент)").unwrap());

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Display, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ClaimCategory {
    #[display("price")]
    Price,
    #[display("tvl")]
    Tvl,
    #[display("percentage")]
    Percentage,
    #[display("date")]
    Date,
    #[display("protocol_info")]
    ProtocolInfo,
    #[default]
    #[serde(other)]
    #[display("other")]
    Other,
}

/// A verifiable statement pulled out of a transcript by the language model.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct Claim {
    #[serde(rename = "claim")]
    pub text: String,
    #[serde(default)]
    pub category: ClaimCategory,
    #[serde(default)]
    pub entities: Vec<String>,
    #[serde(default)]
    pub original_text: String,
    #[serde(default = "default_confidence")]
    pub confidence: f64,
}

fn default_confidence() -> f64 {
    0.5
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Display)]
pub enum FactStatus {
    #[display("verified")]
    Verified,
    #[display("outdated")]
    Outdated,
    #[display("unverified")]
    Unverified,
}

impl std::str::FromStr for FactStatus {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "verified" => Ok(FactStatus::Verified),
            "outdated" => Ok(FactStatus::Outdated),
            "unverified" => Ok(FactStatus::Unverified),
            other => Err(Error::custom(format!("unknown fact status {other:?}"))),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct VerifiedFact {
    pub claim: Claim,
    pub status: FactStatus,
    pub source: Option<&'static str>,
    pub verified_value: Option<String>,
    pub claimed_value: Option<String>,
    pub note: Option<String>,
}

impl VerifiedFact {
    fn unverified(claim: &Claim, note: &str) -> Self {
        Self {
            claim: claim.clone(),
            status: FactStatus::Unverified,
            source: None,
            verified_value: None,
            claimed_value: None,
            note: Some(note.to_string()),
        }
    }

    fn found(claim: &Claim, status: FactStatus, source: &'static str, value: String) -> Self {
        Self {
            claim: claim.clone(),
            status,
            source: Some(source),
            verified_value: Some(value),
            claimed_value: None,
            note: None,
        }
    }

    fn claimed(mut self, value: Option<String>) -> Self {
        self.claimed_value = value;
        self
    }

    fn with_note(mut self, note: impl Into<String>) -> Self {
        self.note = Some(note.into());
        self
    }

    /// One line for the script prompt: the claim plus the current figure.
    pub fn for_prompt(&self) -> String {
        match (&self.verified_value, self.source) {
            (Some(value), Some(source)) => {
                format!("{} (current: {value}, source: {source})", self.claim.text)
            }
            _ => self.claim.text.clone(),
        }
    }
}

pub fn only_verified(facts: &[VerifiedFact]) -> Vec<VerifiedFact> {
    facts
        .iter()
        .filter(|f| f.status == FactStatus::Verified)
        .cloned()
        .collect()
}

/// Lookups against public market data. `Ok(None)` means "not found".
#[async_trait]
pub trait FinancialData: Send + Sync {
    async fn protocol_tvl(&self, protocol: &str) -> Result<Option<f64>>;

    async fn chain_tvl(&self, chain: &str) -> Result<Option<f64>>;

    /// APYs of the project's yield pools, in the order DefiLlama lists them.
    async fn pool_apys(&self, project: &str) -> Result<Vec<f64>>;

    async fn token_price(&self, token: &str) -> Result<Option<f64>>;
}

#[derive(Clone)]
pub struct FactVerifier {
    data: Arc<dyn FinancialData>,
}

impl FactVerifier {
    pub fn new(data: Arc<dyn FinancialData>) -> Self {
        Self { data }
    }

    pub async fn verify_all(&self, claims: &[Claim]) -> Result<Vec<VerifiedFact>> {
        let mut facts = Vec::with_capacity(claims.len());
        for claim in claims {
            let fact = self.verify(claim).await?;
            tracing::debug!(
                claim = %claim.text,
                status = %fact.status,
                source = fact.source,
                "claim checked"
            );
            facts.push(fact);
        }

        let verified = facts
            .iter()
            .filter(|f| f.status == FactStatus::Verified)
            .count();
        tracing::info!(total = facts.len(), verified, "claims verified");
        Ok(facts)
    }

    pub async fn verify(&self, claim: &Claim) -> Result<VerifiedFact> {
        match claim.category {
            ClaimCategory::Tvl => self.verify_tvl(claim).await,
            ClaimCategory::Price => self.verify_price(claim).await,
            ClaimCategory::Percentage => self.verify_yield(claim).await,
            _ => self.verify_general(claim).await,
        }
    }

    async fn verify_tvl(&self, claim: &Claim) -> Result<VerifiedFact> {
        for entity in &claim.entities {
            let Some(actual) = self.data.protocol_tvl(entity).await? else {
                continue;
            };
            let claimed = extract_number(&claim.text);
            let fact = VerifiedFact::found(
                claim,
                judge(claimed, actual, TVL_TOLERANCE),
                DEFILLAMA,
                format_usd(actual, 0),
            )
            .claimed(claimed.map(|c| format_usd(c, 0)));
            return Ok(match claimed {
                Some(_) => fact,
                None => fact.with_note("protocol exists, TVL confirmed"),
            });
        }
        Ok(VerifiedFact::unverified(claim, "no protocol data found"))
    }

    async fn verify_price(&self, claim: &Claim) -> Result<VerifiedFact> {
        for entity in &claim.entities {
            let Some(actual) = self.data.token_price(entity).await? else {
                continue;
            };
            let claimed = extract_number(&claim.text);
            return Ok(VerifiedFact::found(
                claim,
                judge(claimed, actual, PRICE_TOLERANCE),
                COINGECKO,
                format_usd(actual, 2),
            )
            .claimed(claimed.map(|c| format_usd(c, 2))));
        }
        Ok(VerifiedFact::unverified(claim, "no token price found"))
    }

    async fn verify_yield(&self, claim: &Claim) -> Result<VerifiedFact> {
        let Some(claimed) = extract_percentage(&claim.text) else {
            return Ok(VerifiedFact::unverified(claim, "no percentage in claim"));
        };

        for entity in &claim.entities {
            let apys = self.data.pool_apys(entity).await?;
            if apys.is_empty() {
                continue;
            }

            if let Some(apy) = apys
                .iter()
                .take(POOLS_CHECKED)
                .copied()
                .find(|apy| within(claimed, *apy, APY_TOLERANCE))
            {
                return Ok(VerifiedFact::found(
                    claim,
                    FactStatus::Verified,
                    DEFILLAMA,
                    format!("{apy:.1}%"),
                )
                .claimed(Some(format!("{claimed:.1}%"))));
            }

            let sample: Vec<f64> = apys.iter().take(POOLS_AVERAGED).copied().collect();
            let average = sample.iter().sum::<f64>() / sample.len() as f64;
            return Ok(VerifiedFact::found(
                claim,
                FactStatus::Outdated,
                DEFILLAMA,
                format!("~{average:.1}%"),
            )
            .claimed(Some(format!("{claimed:.1}%")))
            .with_note("APY may have changed"));
        }
        Ok(VerifiedFact::unverified(claim, "no yield data found"))
    }

    async fn verify_general(&self, claim: &Claim) -> Result<VerifiedFact> {
        for entity in &claim.entities {
            if let Some(tvl) = self.data.protocol_tvl(entity).await? {
                return Ok(VerifiedFact::found(
                    claim,
                    FactStatus::Verified,
                    DEFILLAMA,
                    format_usd(tvl, 0),
                )
                .with_note(format!("protocol '{entity}' found")));
            }
            if let Some(tvl) = self.data.chain_tvl(entity).await? {
                return Ok(VerifiedFact::found(
                    claim,
                    FactStatus::Verified,
                    DEFILLAMA,
                    format_usd(tvl, 0),
                )
                .with_note(format!("chain '{entity}' found")));
            }
            if let Some(price) = self.data.token_price(entity).await? {
                return Ok(VerifiedFact::found(
                    claim,
                    FactStatus::Verified,
                    COINGECKO,
                    format_usd(price, 2),
                )
                .with_note(format!("token '{entity}' found")));
            }
        }
        Ok(VerifiedFact::unverified(claim, "no matching data found"))
    }
}

/// Verified when the claimed figure is within `tolerance` of the actual one,
/// or when the claim carries no figure to compare.
fn judge(claimed: Option<f64>, actual: f64, tolerance: f64) -> FactStatus {
    match claimed {
        Some(claimed) if within(claimed, actual, tolerance) => FactStatus::Verified,
        Some(_) => FactStatus::Outdated,
        None => FactStatus::Verified,
    }
}

fn within(claimed: f64, actual: f64, tolerance: f64) -> bool {
    if claimed <= 0.0 {
        return false;
    }
    let ratio = actual / claimed;
    (1.0 - tolerance..=1.0 + tolerance).contains(&ratio)
}

/// The claimed figure: a billion-scaled number anywhere in the text, else a
/// million-scaled one, else a thousand-scaled one, else the first number.
/// A suffix must be a whole word right after the number.
pub fn extract_number(text: &str) -> Option<f64> {
    let text = text.to_lowercase().replace(',', "");

    SCALED_NUMBERS.iter().find_map(|(pattern, multiplier)| {
        let caps = pattern.captures(&text)?;
        let digits = caps.get(1).or_else(|| caps.get(0))?;
        let value: f64 = digits.as_str().parse().ok()?;
        Some(value * multiplier)
    })
}

pub fn extract_percentage(text: &str) -> Option<f64> {
    let lower = text.to_lowercase();
    PERCENTAGE
        .captures(&lower)
        .and_then(|caps| caps.get(1))
        .and_then(|m| m.as_str().parse().ok())
}

/// `$1,234,567` style formatting.
pub fn format_usd(value: f64, decimals: usize) -> String {
    let formatted = format!("{:.*}", decimals, value.abs());
    let (int_part, frac_part) = match formatted.split_once('.') {
        Some((i, f)) => (i, Some(f)),
        None => (formatted.as_str(), None),
    };

    let mut grouped = String::with_capacity(int_part.len() + int_part.len() / 3);
    for (i, ch) in int_part.chars().enumerate() {
        if i > 0 && (int_part.len() - i) % 3 == 0 {
            grouped.push(',');
        }
        grouped.push(ch);
    }

    let sign = if value < 0.0 { "-" } else { "" };
    match frac_part {
        Some(frac) => format!("{sign}${grouped}.{frac}"),
        None => format!("{sign}${grouped}"),
    }
}

fn slug(name: &str) -> String {
    name.trim().to_lowercase().split_whitespace().collect::<Vec<_>>().join("-")
}

#[derive(Debug, Clone, Deserialize)]
struct YieldPool {
    #[serde(default)]
    project: String,
    apy: Option<f64>,
}

#[derive(Debug, Deserialize)]
struct YieldPools {
    #[serde(default)]
    data: Vec<YieldPool>,
}

#[derive(Debug, Deserialize)]
struct ChainTvl {
    #[serde(default)]
    name: String,
    #[serde(default)]
    tvl: f64,
}

#[derive(Debug, Deserialize)]
struct CoinSearch {
    #[serde(default)]
    coins: Vec<CoinHit>,
}

#[derive(Debug, Deserialize)]
struct CoinHit {
    id: String,
}

/// DefiLlama for TVL and yields, CoinGecko for prices.
pub struct MarketDataClient {
    http: Client,
    defillama_url: String,
    yields_url: String,
    coingecko_url: String,
    pools: Mutex<Option<(Instant, Arc<Vec<YieldPool>>)>>,
}

impl MarketDataClient {
    pub fn new(
        http: Client,
        defillama_url: impl Into<String>,
        yields_url: impl Into<String>,
        coingecko_url: impl Into<String>,
    ) -> Self {
        Self {
            http,
            defillama_url: defillama_url.into(),
            yields_url: yields_url.into(),
            coingecko_url: coingecko_url.into(),
            pools: Mutex::new(None),
        }
    }

    async fn get_json(
        &self,
        service: &'static str,
        url: &str,
        query: &[(&str, &str)],
    ) -> Result<Option<Value>> {
        let response = self
            .http
            .get(url)
            .query(query)
            .send()
            .await
            .map_err(|e| Error::upstream(service, e))?;

        match response.status() {
            StatusCode::NOT_FOUND | StatusCode::BAD_REQUEST => Ok(None),
            status if status.is_success() => response
                .json::<Value>()
                .await
                .map(Some)
                .map_err(|e| Error::upstream(service, e)),
            status => Err(Error::upstream(service, format!("{url} returned {status}"))),
        }
    }

    /// The full pool list is large, so it is fetched at most once per hour.
    async fn yield_pools(&self) -> Result<Arc<Vec<YieldPool>>> {
        let mut cached = self.pools.lock().await;
        if let Some((fetched_at, pools)) = cached.as_ref()
            && fetched_at.elapsed() < POOLS_TTL
        {
            return Ok(Arc::clone(pools));
        }

        let url = format!("{}/pools", self.yields_url);
        let pools: Vec<YieldPool> = match self.get_json(DEFILLAMA, &url, &[]).await? {
            Some(value) => {
                serde_json::from_value::<YieldPools>(value)
                    .map_err(|e| Error::upstream(DEFILLAMA, e))?
                    .data
            }
            None => Vec::new(),
        };
        let pools = Arc::new(pools);
        *cached = Some((Instant::now(), Arc::clone(&pools)));
        Ok(pools)
    }

    async fn simple_price(&self, coin_id: &str) -> Result<Option<f64>> {
        let url = format!("{}/simple/price", self.coingecko_url);
        let Some(body) = self
            .get_json(COINGECKO, &url, &[("ids", coin_id), ("vs_currencies", "usd")])
            .await?
        else {
            return Ok(None);
        };
        Ok(body.get(coin_id).and_then(|t| t.get("usd")).and_then(Value::as_f64))
    }
}

#[async_trait]
impl FinancialData for MarketDataClient {
    async fn protocol_tvl(&self, protocol: &str) -> Result<Option<f64>> {
        let url = format!("{}/protocol/{}", self.defillama_url, slug(protocol));
        let Some(body) = self.get_json(DEFILLAMA, &url, &[]).await? else {
            return Ok(None);
        };

        // `tvl` is a daily series; the last point is the current value.
        let tvl = match body.get("tvl") {
            Some(Value::Array(series)) => series
                .last()
                .and_then(|point| point.get("totalLiquidityUSD"))
                .and_then(Value::as_f64),
            Some(value) => value.as_f64(),
            None => None,
        };
        tracing::debug!(protocol, ?tvl, "defillama protocol tvl");
        Ok(tvl)
    }

    async fn chain_tvl(&self, chain: &str) -> Result<Option<f64>> {
        let url = format!("{}/v2/chains", self.defillama_url);
        let Some(body) = self.get_json(DEFILLAMA, &url, &[]).await? else {
            return Ok(None);
        };
        let chains: Vec<ChainTvl> =
            serde_json::from_value(body).map_err(|e| Error::upstream(DEFILLAMA, e))?;
        let wanted = chain.trim().to_lowercase();
        Ok(chains
            .into_iter()
            .find(|c| c.name.to_lowercase() == wanted)
            .map(|c| c.tvl))
    }

    async fn pool_apys(&self, project: &str) -> Result<Vec<f64>> {
        let wanted = slug(project);
        let pools = self.yield_pools().await?;
        Ok(pools
            .iter()
            .filter(|p| p.project.to_lowercase() == wanted)
            .filter_map(|p| p.apy)
            .collect())
    }

    async fn token_price(&self, token: &str) -> Result<Option<f64>> {
        let id = slug(token);
        if let Some(price) = self.simple_price(&id).await? {
            return Ok(Some(price));
        }

        // Not a CoinGecko id; resolve the name or symbol through search.
        let url = format!("{}/search", self.coingecko_url);
        let Some(body) = self.get_json(COINGECKO, &url, &[("query", token)]).await? else {
            return Ok(None);
        };
        let search: CoinSearch =
            serde_json::from_value(body).map_err(|e| Error::upstream(COINGECKO, e))?;
        match search.coins.into_iter().next() {
            Some(hit) if hit.id != id => self.simple_price(&hit.id).await,
            _ => Ok(None),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    #[derive(Default)]
    struct FakeData {
        tvl: HashMap<&'static str, f64>,
        chains: HashMap<&'static str, f64>,
        apys: HashMap<&'static str, Vec<f64>>,
        prices: HashMap<&'static str, f64>,
        fail: bool,
    }

    #[async_trait]
    impl FinancialData for FakeData {
        async fn protocol_tvl(&self, protocol: &str) -> Result<Option<f64>> {
            if self.fail {
                return Err(Error::upstream(DEFILLAMA, "503"));
            }
            Ok(self.tvl.get(protocol).copied())
        }

        async fn chain_tvl(&self, chain: &str) -> Result<Option<f64>> {
            Ok(self.chains.get(chain).copied())
        }

        async fn pool_apys(&self, project: &str) -> Result<Vec<f64>> {
            Ok(self.apys.get(project).cloned().unwrap_or_default())
        }

        async fn token_price(&self, token: &str) -> Result<Option<f64>> {
            Ok(self.prices.get(token).copied())
        }
    }

    fn claim(text: &str, category: ClaimCategory, entities: &[&str]) -> Claim {
        Claim {
            text: text.to_string(),
            category,
            entities: entities.iter().map(|e| e.to_string()).collect(),
            original_text: String::new(),
            confidence: 0.9,
        }
    }

    fn verifier(data: FakeData) -> FactVerifier {
        FactVerifier::new(Arc::new(data))
    }

    #[test]
    fn numbers_with_suffixes() {
        assert_eq!(extract_number("Aave has $10.5 billion locked"), Some(10.5e9));
        assert_eq!(extract_number("TVL of 1,500,000 dollars"), Some(1_500_000.0));
        assert_eq!(extract_number("about $250M in deposits"), Some(250e6));
        assert_eq!(extract_number("ETH trades at $3,200"), Some(3_200.0));
        assert_eq!(extract_number("12k holders"), Some(12_000.0));
        assert_eq!(extract_number("no figures here"), None);
    }

    #[test]
    fn scaled_figures_win_over_earlier_numbers() {
        assert_eq!(extract_number("Aave TVL grew 20% to $10 billion"), Some(10e9));
        assert_eq!(extract_number("In 2024 Aave TVL hit $10 billion"), Some(10e9));
        assert_eq!(extract_number("3 chains and 400 million in deposits"), Some(400e6));
        assert_eq!(extract_number("10bn locked"), Some(10e9));
    }

    #[test]
    fn suffix_must_be_a_whole_word() {
        assert_eq!(extract_number("ETH trades at $3,200 more or less"), Some(3_200.0));
        assert_eq!(extract_number("5 bridges and 12 keepers"), Some(5.0));
    }

    #[test]
    fn russian_suffixes() {
        assert_eq!(extract_number("TVL Aave 10 млрд"), Some(10e9));
        assert_eq!(extract_number("депозиты 250 млн долларов"), Some(250e6));
        assert_eq!(extract_number("около 40 тыс. пользователей"), Some(40e3));
        assert_eq!(extract_percentage("доходность 12 процентов"), Some(12.0));
    }

    #[test]
    fn percentages() {
        assert_eq!(extract_percentage("earn 12.5% APY"), Some(12.5));
        assert_eq!(extract_percentage("up to 8 percent"), Some(8.0));
        assert_eq!(extract_percentage("high yield"), None);
    }

    #[test]
    fn usd_formatting_groups_thousands() {
        assert_eq!(format_usd(1_234_567.0, 0), "$1,234,567");
        assert_eq!(format_usd(3_200.456, 2), "$3,200.46");
        assert_eq!(format_usd(999.0, 0), "$999");
        assert_eq!(format_usd(-1_000.0, 0), "-$1,000");
    }

    #[test]
    fn tolerance_bands() {
        assert_eq!(judge(Some(100.0), 115.0, TVL_TOLERANCE), FactStatus::Verified);
        assert_eq!(judge(Some(100.0), 125.0, TVL_TOLERANCE), FactStatus::Outdated);
        assert_eq!(judge(Some(100.0), 85.0, TVL_TOLERANCE), FactStatus::Verified);
        assert_eq!(judge(None, 1.0, PRICE_TOLERANCE), FactStatus::Verified);
        assert_eq!(judge(Some(0.0), 1.0, PRICE_TOLERANCE), FactStatus::Outdated);
    }

    #[tokio::test]
    async fn tvl_claim_within_band_is_verified() {
        let data = FakeData {
            tvl: HashMap::from([("aave", 10.8e9)]),
            ..FakeData::default()
        };
        let fact = verifier(data)
            .verify(&claim("Aave TVL is $10 billion", ClaimCategory::Tvl, &["aave"]))
            .await
            .unwrap();
        assert_eq!(fact.status, FactStatus::Verified);
        assert_eq!(fact.source, Some(DEFILLAMA));
        assert_eq!(fact.verified_value.as_deref(), Some("$10,800,000,000"));
        assert_eq!(fact.claimed_value.as_deref(), Some("$10,000,000,000"));
    }

    #[tokio::test]
    async fn growth_percentage_does_not_hide_the_tvl_figure() {
        let data = FakeData {
            tvl: HashMap::from([("aave", 10.8e9)]),
            ..FakeData::default()
        };
        let fact = verifier(data)
            .verify(&claim(
                "In 2024 Aave TVL grew 20% to $10 billion",
                ClaimCategory::Tvl,
                &["aave"],
            ))
            .await
            .unwrap();
        assert_eq!(fact.status, FactStatus::Verified);
    }

    #[tokio::test]
    async fn stale_price_is_outdated() {
        let data = FakeData {
            prices: HashMap::from([("ethereum", 2_500.0)]),
            ..FakeData::default()
        };
        let fact = verifier(data)
            .verify(&claim(
                "ETH is at $4,000",
                ClaimCategory::Price,
                &["eth", "ethereum"],
            ))
            .await
            .unwrap();
        assert_eq!(fact.status, FactStatus::Outdated);
        assert_eq!(fact.source, Some(COINGECKO));
    }

    #[tokio::test]
    async fn yield_claim_matches_any_close_pool() {
        let data = FakeData {
            apys: HashMap::from([("lido", vec![2.1, 3.4, 9.0])]),
            ..FakeData::default()
        };
        let v = verifier(data);
        let verified = v
            .verify(&claim("Lido pays 3.5% APY", ClaimCategory::Percentage, &["lido"]))
            .await
            .unwrap();
        assert_eq!(verified.status, FactStatus::Verified);
        assert_eq!(verified.verified_value.as_deref(), Some("3.4%"));

        let outdated = v
            .verify(&claim("Lido pays 30% APY", ClaimCategory::Percentage, &["lido"]))
            .await
            .unwrap();
        assert_eq!(outdated.status, FactStatus::Outdated);
        assert_eq!(outdated.verified_value.as_deref(), Some("~4.8%"));
    }

    #[tokio::test]
    async fn general_claim_falls_through_sources() {
        let data = FakeData {
            chains: HashMap::from([("arbitrum", 2.0e9)]),
            ..FakeData::default()
        };
        let v = verifier(data);
        let fact = v
            .verify(&claim(
                "Arbitrum launched in 2021",
                ClaimCategory::Date,
                &["arbitrum"],
            ))
            .await
            .unwrap();
        assert_eq!(fact.status, FactStatus::Verified);

        let unknown = v
            .verify(&claim("Foo is great", ClaimCategory::Other, &["foo"]))
            .await
            .unwrap();
        assert_eq!(unknown.status, FactStatus::Unverified);
    }

    #[tokio::test]
    async fn source_errors_propagate() {
        let data = FakeData {
            fail: true,
            ..FakeData::default()
        };
        let result = verifier(data)
            .verify_all(&[claim("Aave TVL is $10bn", ClaimCategory::Tvl, &["aave"])])
            .await;
        assert!(matches!(result, Err(Error::UpstreamUnavailable { .. })));
    }

    #[test]
    fn only_verified_filters() {
        let base = claim("x", ClaimCategory::Other, &[]);
        let facts = vec![
            VerifiedFact::found(&base, FactStatus::Verified, DEFILLAMA, "$1".to_string()),
            VerifiedFact::unverified(&base, "nothing"),
        ];
        assert_eq!(only_verified(&facts).len(), 1);
        assert_eq!(facts[0].for_prompt(), "x (current: $1, source: defillama)");
    }

    #[test]
    fn slugs_are_lowercase_dashed() {
        assert_eq!(slug("  Curve DEX "), "curve-dex");
        assert_eq!(slug("aave"), "aave");
    }
}
