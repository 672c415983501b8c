use crate::models::category::{Classification, ExposureBucket, MainCategory, SubCategory};
use crate::models::position::{AssetType, Position};

/// One row of the static symbol table.
struct TableEntry {
    symbol: &'static str,
    sub: SubCategory,
    exposure: ExposureBucket,
    /// Asset type a bare symbol most likely refers to
    native: AssetType,
}

const fn entry(
    symbol: &'static str,
    sub: SubCategory,
    exposure: ExposureBucket,
    native: AssetType,
) -> TableEntry {
    TableEntry {
        symbol,
        sub,
        exposure,
        native,
    }
}

use crate::models::category::ExposureBucket as X;
use crate::models::category::SubCategory as S;
use crate::models::position::AssetType as T;

/// Known symbols. Anything missing falls back on the asset type.
const SYMBOL_TABLE: &[TableEntry] = &[
    // Bitcoin and wrapped variants
    entry("BTC", S::Btc, X::CryptoRisk, T::Crypto),
    entry("WBTC", S::Btc, X::CryptoRisk, T::Crypto),
    entry("CBBTC", S::Btc, X::CryptoRisk, T::Crypto),
    entry("TBTC", S::Btc, X::CryptoRisk, T::Crypto),
    // Ether and liquid staking
    entry("ETH", S::Eth, X::CryptoRisk, T::Crypto),
    entry("WETH", S::Eth, X::CryptoRisk, T::Crypto),
    entry("STETH", S::Eth, X::CryptoRisk, T::Crypto),
    entry("WSTETH", S::Eth, X::CryptoRisk, T::Crypto),
    entry("RETH", S::Eth, X::CryptoRisk, T::Crypto),
    entry("CBETH", S::Eth, X::CryptoRisk, T::Crypto),
    entry("WEETH", S::Eth, X::CryptoRisk, T::Crypto),
    // Solana
    entry("SOL", S::Sol, X::CryptoRisk, T::Crypto),
    entry("JITOSOL", S::Sol, X::CryptoRisk, T::Crypto),
    entry("MSOL", S::Sol, X::CryptoRisk, T::Crypto),
    // Stablecoins
    entry("USDT", S::Stablecoins, X::CashEquivalent, T::Crypto),
    entry("USDC", S::Stablecoins, X::CashEquivalent, T::Crypto),
    entry("DAI", S::Stablecoins, X::CashEquivalent, T::Crypto),
    entry("USDS", S::Stablecoins, X::CashEquivalent, T::Crypto),
    entry("USDE", S::Stablecoins, X::CashEquivalent, T::Crypto),
    entry("SUSDE", S::Stablecoins, X::CashEquivalent, T::Crypto),
    entry("FDUSD", S::Stablecoins, X::CashEquivalent, T::Crypto),
    entry("PYUSD", S::Stablecoins, X::CashEquivalent, T::Crypto),
    entry("TUSD", S::Stablecoins, X::CashEquivalent, T::Crypto),
    entry("FRAX", S::Stablecoins, X::CashEquivalent, T::Crypto),
    entry("GHO", S::Stablecoins, X::CashEquivalent, T::Crypto),
    entry("LUSD", S::Stablecoins, X::CashEquivalent, T::Crypto),
    entry("EURC", S::Stablecoins, X::CashEquivalent, T::Crypto),
    // DeFi governance tokens
    entry("AAVE", S::Defi, X::CryptoRisk, T::Crypto),
    entry("UNI", S::Defi, X::CryptoRisk, T::Crypto),
    entry("MKR", S::Defi, X::CryptoRisk, T::Crypto),
    entry("CRV", S::Defi, X::CryptoRisk, T::Crypto),
    entry("LDO", S::Defi, X::CryptoRisk, T::Crypto),
    entry("COMP", S::Defi, X::CryptoRisk, T::Crypto),
    entry("SNX", S::Defi, X::CryptoRisk, T::Crypto),
    entry("PENDLE", S::Defi, X::CryptoRisk, T::Crypto),
    entry("GMX", S::Defi, X::CryptoRisk, T::Crypto),
    entry("JUP", S::Defi, X::CryptoRisk, T::Crypto),
    entry("HYPE", S::Defi, X::CryptoRisk, T::Crypto),
    // Tokenized and physical metals
    entry("PAXG", S::Gold, X::Commodity, T::Crypto),
    entry("XAUT", S::Gold, X::Commodity, T::Crypto),
    entry("XAU", S::Gold, X::Commodity, T::Manual),
    entry("GOLD", S::Gold, X::Commodity, T::Manual),
    entry("XAG", S::Silver, X::Commodity, T::Manual),
    entry("SILVER", S::Silver, X::Commodity, T::Manual),
    entry("XPT", S::Platinum, X::Commodity, T::Manual),
    entry("PLATINUM", S::Platinum, X::Commodity, T::Manual),
    // Fiat
    entry("USD", S::Fiat, X::CashEquivalent, T::Cash),
    entry("EUR", S::Fiat, X::CashEquivalent, T::Cash),
    entry("GBP", S::Fiat, X::CashEquivalent, T::Cash),
    entry("CHF", S::Fiat, X::CashEquivalent, T::Cash),
    entry("JPY", S::Fiat, X::CashEquivalent, T::Cash),
    entry("CAD", S::Fiat, X::CashEquivalent, T::Cash),
    entry("AUD", S::Fiat, X::CashEquivalent, T::Cash),
    entry("PLN", S::Fiat, X::CashEquivalent, T::Cash),
    entry("SEK", S::Fiat, X::CashEquivalent, T::Cash),
    entry("NOK", S::Fiat, X::CashEquivalent, T::Cash),
    // ETFs (commodity funds keep commodity exposure)
    entry("SPY", S::Etfs, X::Equity, T::Etf),
    entry("VOO", S::Etfs, X::Equity, T::Etf),
    entry("VTI", S::Etfs, X::Equity, T::Etf),
    entry("VT", S::Etfs, X::Equity, T::Etf),
    entry("QQQ", S::Etfs, X::Equity, T::Etf),
    entry("IWM", S::Etfs, X::Equity, T::Etf),
    entry("VXUS", S::Etfs, X::Equity, T::Etf),
    entry("IBIT", S::Etfs, X::CryptoRisk, T::Etf),
    entry("FBTC", S::Etfs, X::CryptoRisk, T::Etf),
    entry("GLD", S::Etfs, X::Commodity, T::Etf),
    entry("IAU", S::Etfs, X::Commodity, T::Etf),
    entry("SLV", S::Etfs, X::Commodity, T::Etf),
    // Equities
    entry("AAPL", S::Equities, X::Equity, T::Stock),
    entry("MSFT", S::Equities, X::Equity, T::Stock),
    entry("GOOGL", S::Equities, X::Equity, T::Stock),
    entry("GOOG", S::Equities, X::Equity, T::Stock),
    entry("AMZN", S::Equities, X::Equity, T::Stock),
    entry("NVDA", S::Equities, X::Equity, T::Stock),
    entry("META", S::Equities, X::Equity, T::Stock),
    entry("TSLA", S::Equities, X::Equity, T::Stock),
    entry("NFLX", S::Equities, X::Equity, T::Stock),
    entry("AMD", S::Equities, X::Equity, T::Stock),
    entry("COIN", S::Equities, X::Equity, T::Stock),
    entry("MSTR", S::Equities, X::Equity, T::Stock),
    entry("HOOD", S::Equities, X::Equity, T::Stock),
    entry("BRK.B", S::Equities, X::Equity, T::Stock),
];

/// Static symbol → taxonomy lookup.
///
/// Pure and table driven: no network, no learning. New symbols need a table
/// entry; until then the asset-type fallback places them.
pub struct CategoryService;

impl CategoryService {
    pub fn new() -> Self {
        Self
    }

    /// Classify a bare symbol of a given asset type.
    ///
    /// A table entry is only used when it is compatible with the asset type
    /// (a stock ticker "COMP" is not the Compound token).
    pub fn classify(&self, symbol: &str, asset_type: AssetType) -> Classification {
        let upper = symbol.trim().to_uppercase();
        if let Some(entry) = Self::lookup(&upper) {
            if Self::compatible(asset_type, entry) {
                return Classification {
                    main: entry.sub.main(),
                    sub: entry.sub,
                    exposure: entry.exposure,
                };
            }
        }
        Self::fallback(asset_type)
    }

    /// Classify a position, honoring its `asset_class_override`.
    pub fn classify_position(&self, position: &Position) -> Classification {
        let base = self.classify(&position.symbol, position.asset_type);
        match position.asset_class_override {
            Some(main) if main != base.main => Self::for_main(main),
            _ => base,
        }
    }

    pub fn main_category(&self, position: &Position) -> MainCategory {
        self.classify_position(position).main
    }

    /// Best guess of the asset type for a symbol typed without context.
    /// Unknown symbols are assumed to be crypto.
    pub fn infer_asset_type(&self, symbol: &str) -> AssetType {
        let upper = symbol.trim().to_uppercase();
        Self::lookup(&upper)
            .map(|e| e.native)
            .unwrap_or(AssetType::Crypto)
    }

    /// True if the symbol has an entry in the table.
    pub fn is_known(&self, symbol: &str) -> bool {
        Self::lookup(&symbol.trim().to_uppercase()).is_some()
    }

    /// All symbols in the table, in table order.
    pub fn known_symbols(&self) -> Vec<&'static str> {
        SYMBOL_TABLE.iter().map(|e| e.symbol).collect()
    }

    fn lookup(upper: &str) -> Option<&'static TableEntry> {
        SYMBOL_TABLE.iter().find(|e| e.symbol == upper)
    }

    fn compatible(asset_type: AssetType, entry: &TableEntry) -> bool {
        match asset_type {
            AssetType::Crypto => entry.native == AssetType::Crypto,
            AssetType::Stock | AssetType::Etf => {
                matches!(entry.native, AssetType::Stock | AssetType::Etf)
            }
            AssetType::Cash => entry.native == AssetType::Cash,
            AssetType::Manual => true,
        }
    }

    fn fallback(asset_type: AssetType) -> Classification {
        let (sub, exposure) = match asset_type {
            AssetType::Crypto => (SubCategory::Tokens, ExposureBucket::CryptoRisk),
            AssetType::Stock => (SubCategory::Equities, ExposureBucket::Equity),
            AssetType::Etf => (SubCategory::Etfs, ExposureBucket::Equity),
            AssetType::Cash => (SubCategory::Fiat, ExposureBucket::CashEquivalent),
            AssetType::Manual => (SubCategory::Unclassified, ExposureBucket::Unclassified),
        };
        Classification {
            main: sub.main(),
            sub,
            exposure,
        }
    }

    /// Default classification for an explicit main-category override.
    fn for_main(main: MainCategory) -> Classification {
        let (sub, exposure) = match main {
            MainCategory::Crypto => (SubCategory::Tokens, ExposureBucket::CryptoRisk),
            MainCategory::Stock => (SubCategory::Equities, ExposureBucket::Equity),
            MainCategory::Cash => (SubCategory::Fiat, ExposureBucket::CashEquivalent),
            MainCategory::Metals => (SubCategory::Gold, ExposureBucket::Commodity),
            MainCategory::Other => (SubCategory::Unclassified, ExposureBucket::Unclassified),
        };
        Classification {
            main,
            sub,
            exposure,
        }
    }
}

impl Default for CategoryService {
    fn default() -> Self {
        Self::new()
    }
}
