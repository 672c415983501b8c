// ═══════════════════════════════════════════════════════════════════
// Service Tests: valuation, aggregation, exposure, categories,
// snapshots and the position/account operations
// ═══════════════════════════════════════════════════════════════════

use chrono::{Duration, NaiveDate, TimeZone, Utc};
use uuid::Uuid;

use portfolio_tracker_core::errors::CoreError;
use portfolio_tracker_core::models::account::{CashAccount, CexAccount, Exchange, Wallet};
use portfolio_tracker_core::models::analytics::{SortDirection, SortField};
use portfolio_tracker_core::models::category::{ExposureBucket, MainCategory, SubCategory};
use portfolio_tracker_core::models::portfolio::PortfolioState;
use portfolio_tracker_core::models::position::{AssetType, CustodyBucket, Position};
use portfolio_tracker_core::models::price::{CustomPrice, CustomPriceMap, PriceData, PriceMap};
use portfolio_tracker_core::models::valued::AssetWithPrice;
use portfolio_tracker_core::services::aggregation_service::AggregationService;
use portfolio_tracker_core::services::category_service::CategoryService;
use portfolio_tracker_core::services::exposure_service::ExposureService;
use portfolio_tracker_core::services::portfolio_service::{PortfolioService, PositionUpdate};
use portfolio_tracker_core::services::snapshot_service::SnapshotService;
use portfolio_tracker_core::services::valuation_service::ValuationService;

// ═══════════════════════════════════════════════════════════════════
// Test Helpers
// ═══════════════════════════════════════════════════════════════════

const EPS: f64 = 1e-9;

fn approx(a: f64, b: f64) -> bool {
    (a - b).abs() < 1e-6
}

/// Price map from (symbol, price, absolute 24h change) triples.
fn prices(entries: &[(&str, f64, f64)]) -> PriceMap {
    entries
        .iter()
        .map(|(symbol, price, change)| {
            let mut data = PriceData::new(symbol, *price, 0.0);
            data.change_24h = *change;
            data.change_percent_24h = if price - change != 0.0 {
                change / (price - change) * 100.0
            } else {
                0.0
            };
            (data.symbol.clone(), data)
        })
        .collect()
}

fn custom(entries: &[(&str, f64)]) -> CustomPriceMap {
    entries
        .iter()
        .map(|(symbol, price)| {
            let c = CustomPrice::new(symbol, *price);
            (c.symbol.clone(), c)
        })
        .collect()
}

fn value(positions: &[Position], prices: &PriceMap) -> Vec<AssetWithPrice> {
    ValuationService::new().value_positions(positions, prices, &CustomPriceMap::new())
}

/// A valued set with a fixed value per symbol (price 1, amount = value).
fn valued_at(entries: &[(&str, AssetType, f64)]) -> Vec<AssetWithPrice> {
    let positions: Vec<Position> = entries
        .iter()
        .map(|(symbol, asset_type, v)| {
            let p = Position::new(*asset_type, *symbol, *symbol, v.abs());
            if *v < 0.0 {
                p.as_debt()
            } else {
                p
            }
        })
        .collect();
    let map: Vec<(&str, f64, f64)> = entries.iter().map(|(s, _, _)| (*s, 1.0, 0.0)).collect();
    value(&positions, &prices(&map))
}

// ═══════════════════════════════════════════════════════════════════
// ValuationService
// ═══════════════════════════════════════════════════════════════════

mod valuation {
    use super::*;

    #[test]
    fn value_is_amount_times_market_price() {
        let positions = vec![Position::crypto("BTC", "Bitcoin", 0.5)];
        let assets = value(&positions, &prices(&[("btc", 50_000.0, 1_000.0)]));
        assert_eq!(assets.len(), 1);
        assert!(approx(assets[0].current_price, 50_000.0));
        assert!(approx(assets[0].value, 25_000.0));
        assert!(approx(assets[0].change_24h, 500.0));
        assert!(!assets[0].has_custom_price);
    }

    #[test]
    fn custom_price_beats_market_price() {
        let positions = vec![Position::crypto("BTC", "Bitcoin", 1.0)];
        let assets = ValuationService::new().value_positions(
            &positions,
            &prices(&[("btc", 50_000.0, 2_000.0)]),
            &custom(&[("BTC", 60_000.0)]),
        );
        assert!(approx(assets[0].current_price, 60_000.0));
        assert!(approx(assets[0].value, 60_000.0));
        assert!(assets[0].has_custom_price);
        assert_eq!(assets[0].change_24h, 0.0);
        assert_eq!(assets[0].change_percent_24h, 0.0);
    }

    #[test]
    fn missing_price_values_at_zero() {
        let positions = vec![Position::crypto("OBSCURE", "Obscure", 1_000.0)];
        let assets = value(&positions, &PriceMap::new());
        assert_eq!(assets[0].value, 0.0);
        assert_eq!(assets[0].current_price, 0.0);
        assert_eq!(assets[0].allocation, 0.0);
    }

    #[test]
    fn debt_contributes_negative_value_and_change() {
        let positions = vec![Position::crypto("USDC", "Borrowed USDC", 1_000.0).as_debt()];
        let assets = value(&positions, &prices(&[("usdc", 1.0, 0.01)]));
        assert!(approx(assets[0].value, -1_000.0));
        assert!(approx(assets[0].change_24h, -10.0));
    }

    #[test]
    fn order_is_preserved() {
        let positions = vec![
            Position::crypto("SOL", "Solana", 1.0),
            Position::crypto("BTC", "Bitcoin", 1.0),
            Position::stock("AAPL", "Apple", 1.0),
        ];
        let assets = value(&positions, &PriceMap::new());
        let symbols: Vec<&str> = assets.iter().map(|a| a.symbol()).collect();
        assert_eq!(symbols, vec!["SOL", "BTC", "AAPL"]);
    }

    #[test]
    fn allocations_of_assets_sum_to_100() {
        let assets = valued_at(&[
            ("BTC", AssetType::Crypto, 600.0),
            ("ETH", AssetType::Crypto, 300.0),
            ("USD", AssetType::Cash, 100.0),
        ]);
        let total: f64 = assets.iter().map(|a| a.allocation).sum();
        assert!(approx(total, 100.0));
        assert!(approx(assets[0].allocation, 60.0));
    }

    #[test]
    fn debt_allocation_is_negative_share_of_assets() {
        let assets = valued_at(&[
            ("ETH", AssetType::Crypto, 1_000.0),
            ("USDC", AssetType::Crypto, -250.0),
        ]);
        assert!(approx(assets[0].allocation, 100.0));
        assert!(approx(assets[1].allocation, -25.0));
    }

    #[test]
    fn allocation_zero_when_nothing_is_priced() {
        let positions = vec![Position::crypto("A", "A", 1.0), Position::crypto("B", "B", 1.0)];
        let assets = value(&positions, &PriceMap::new());
        assert!(assets.iter().all(|a| a.allocation == 0.0));
    }

    #[test]
    fn lookups_are_case_insensitive() {
        let svc = ValuationService::new();
        let map = prices(&[("eth", 3_000.0, 0.0)]);
        assert_eq!(svc.effective_price("ETH", &map, &CustomPriceMap::new()), 3_000.0);
        assert_eq!(svc.effective_price(" Eth ", &map, &CustomPriceMap::new()), 3_000.0);
        assert_eq!(svc.effective_price("DOGE", &map, &CustomPriceMap::new()), 0.0);
    }

    #[test]
    fn empty_input_gives_empty_output() {
        assert!(value(&[], &PriceMap::new()).is_empty());
    }
}

// ═══════════════════════════════════════════════════════════════════
// AggregationService
// ═══════════════════════════════════════════════════════════════════

mod aggregation {
    use super::*;

    #[test]
    fn same_symbol_positions_merge() {
        let positions = vec![
            Position::crypto("BTC", "Bitcoin", 1.0),
            Position::crypto("btc", "Bitcoin (Ledger)", 0.5),
        ];
        let assets = value(&positions, &prices(&[("btc", 50_000.0, 0.0)]));
        let rows = AggregationService::new().aggregate_by_symbol(&assets);

        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].symbol, "BTC");
        assert!(approx(rows[0].amount, 1.5));
        assert!(approx(rows[0].value, 75_000.0));
        assert!(approx(rows[0].current_price, 50_000.0));
        assert!(approx(rows[0].allocation, 100.0));
        assert_eq!(rows[0].position_ids.len(), 2);
    }

    #[test]
    fn aggregation_preserves_total_value() {
        let positions = vec![
            Position::crypto("BTC", "Bitcoin", 1.0),
            Position::crypto("ETH", "Ether", 2.0),
            Position::crypto("BTC", "Bitcoin", 0.25),
            Position::crypto("USDC", "Loan", 500.0).as_debt(),
        ];
        let map = prices(&[("btc", 40_000.0, 0.0), ("eth", 2_000.0, 0.0), ("usdc", 1.0, 0.0)]);
        let assets = value(&positions, &map);
        let rows = AggregationService::new().aggregate_by_symbol(&assets);

        let before: f64 = assets.iter().map(|a| a.value).sum();
        let after: f64 = rows.iter().map(|r| r.value).sum();
        assert!((before - after).abs() < EPS);
    }

    #[test]
    fn debt_and_owned_rows_stay_separate() {
        let positions = vec![
            Position::crypto("USDC", "Savings", 1_000.0),
            Position::crypto("USDC", "Loan", 400.0).as_debt(),
        ];
        let assets = value(&positions, &prices(&[("usdc", 1.0, 0.0)]));
        let rows = AggregationService::new().aggregate_by_symbol(&assets);
        assert_eq!(rows.len(), 2);
        assert!(!rows[0].is_debt);
        assert!(rows[1].is_debt);
        assert!(approx(rows[1].value, -400.0));
        assert!(approx(rows[1].current_price, 1.0));
    }

    #[test]
    fn zero_amount_row_has_zero_price() {
        let positions = vec![Position::crypto("ETH", "Ether", 0.0)];
        let assets = value(&positions, &prices(&[("eth", 3_000.0, 0.0)]));
        let rows = AggregationService::new().aggregate_by_symbol(&assets);
        assert_eq!(rows[0].current_price, 0.0);
    }

    #[test]
    fn by_main_category_groups_and_orders_by_value() {
        let assets = valued_at(&[
            ("BTC", AssetType::Crypto, 500.0),
            ("AAPL", AssetType::Stock, 300.0),
            ("ETH", AssetType::Crypto, 200.0),
        ]);
        let groups = AggregationService::new().by_main_category(&assets);
        assert_eq!(groups.len(), 2);
        assert_eq!(groups[0].key, MainCategory::Crypto);
        assert!(approx(groups[0].value, 700.0));
        assert!(approx(groups[0].percentage, 70.0));
        assert_eq!(groups[0].position_count, 2);
        assert_eq!(groups[1].key, MainCategory::Stock);
    }

    #[test]
    fn by_sub_category_and_exposure_bucket() {
        let assets = valued_at(&[
            ("USDC", AssetType::Crypto, 100.0),
            ("USD", AssetType::Cash, 100.0),
            ("PAXG", AssetType::Crypto, 50.0),
        ]);
        let svc = AggregationService::new();

        let subs = svc.by_sub_category(&assets);
        assert!(subs.iter().any(|g| g.key == SubCategory::Stablecoins));
        assert!(subs.iter().any(|g| g.key == SubCategory::Fiat));
        assert!(subs.iter().any(|g| g.key == SubCategory::Gold));

        let buckets = svc.by_exposure_bucket(&assets);
        assert_eq!(buckets[0].key, ExposureBucket::CashEquivalent);
        assert!(approx(buckets[0].value, 200.0));
        assert_eq!(buckets[0].position_count, 2);
    }

    #[test]
    fn by_custody_uses_accounts_and_wallet_addresses() {
        let wallet = Wallet::new("Ledger", "0xabc", vec!["ethereum".into()]);
        let cex = CexAccount::new("Main", Exchange::Binance, "k", "s");
        let positions = vec![
            Position::crypto("BTC", "Bitcoin", 1.0).with_account(cex.id),
            Position::crypto("ETH", "Ether", 1.0).with_account(wallet.id),
            Position::crypto("SOL", "Solana", 1.0).with_wallet("SoLaddr", "solana"),
            Position::stock("AAPL", "Apple", 1.0),
        ];
        let assets = value(
            &positions,
            &prices(&[("btc", 10.0, 0.0), ("eth", 10.0, 0.0), ("sol", 10.0, 0.0), ("aapl", 10.0, 0.0)]),
        );
        let groups = AggregationService::new().by_custody(&assets, &[wallet], &[cex]);

        let count = |bucket: CustodyBucket| {
            groups
                .iter()
                .find(|g| g.key == bucket)
                .map(|g| g.position_count)
                .unwrap_or(0)
        };
        assert_eq!(count(CustodyBucket::Exchange), 1);
        assert_eq!(count(CustodyBucket::Wallet), 2);
        assert_eq!(count(CustodyBucket::Manual), 1);
    }

    #[test]
    fn by_chain_lowercases_and_keeps_unchained() {
        let positions = vec![
            Position::crypto("ETH", "Ether", 1.0).with_wallet("0x1", "Arbitrum"),
            Position::crypto("USDC", "USDC", 1.0).with_wallet("0x1", "arbitrum"),
            Position::stock("AAPL", "Apple", 1.0),
        ];
        let assets = value(&positions, &PriceMap::new());
        let groups = AggregationService::new().by_chain(&assets);
        assert_eq!(groups.len(), 2);
        let arb = groups
            .iter()
            .find(|g| g.key.as_deref() == Some("arbitrum"))
            .unwrap();
        assert_eq!(arb.position_count, 2);
        assert!(groups.iter().any(|g| g.key.is_none()));
    }

    #[test]
    fn sort_by_value_desc_uses_absolute_debt_value() {
        let mut assets = valued_at(&[
            ("ETH", AssetType::Crypto, 100.0),
            ("USDC", AssetType::Crypto, -500.0),
            ("BTC", AssetType::Crypto, 300.0),
        ]);
        AggregationService::new().sort_rows(&mut assets, SortField::Value, SortDirection::Desc);
        let symbols: Vec<&str> = assets.iter().map(|a| a.symbol()).collect();
        assert_eq!(symbols, vec!["USDC", "BTC", "ETH"]);
    }

    #[test]
    fn sort_is_stable_on_ties() {
        let mut assets = valued_at(&[
            ("AAA", AssetType::Crypto, 100.0),
            ("BBB", AssetType::Crypto, 100.0),
            ("CCC", AssetType::Crypto, 100.0),
        ]);
        let svc = AggregationService::new();
        svc.sort_rows(&mut assets, SortField::Value, SortDirection::Desc);
        let symbols: Vec<&str> = assets.iter().map(|a| a.symbol()).collect();
        assert_eq!(symbols, vec!["AAA", "BBB", "CCC"]);

        svc.sort_rows(&mut assets, SortField::Value, SortDirection::Asc);
        let symbols: Vec<&str> = assets.iter().map(|a| a.symbol()).collect();
        assert_eq!(symbols, vec!["AAA", "BBB", "CCC"]);
    }

    #[test]
    fn sort_by_symbol_and_amount() {
        let svc = AggregationService::new();
        let mut assets = valued_at(&[
            ("eth", AssetType::Crypto, 2.0),
            ("BTC", AssetType::Crypto, 1.0),
            ("SOL", AssetType::Crypto, 3.0),
        ]);
        svc.sort_rows(&mut assets, SortField::Symbol, SortDirection::Asc);
        let symbols: Vec<&str> = assets.iter().map(|a| a.symbol()).collect();
        assert_eq!(symbols, vec!["BTC", "ETH", "SOL"]);

        svc.sort_rows(&mut assets, SortField::Amount, SortDirection::Desc);
        let symbols: Vec<&str> = assets.iter().map(|a| a.symbol()).collect();
        assert_eq!(symbols, vec!["SOL", "ETH", "BTC"]);
    }

    #[test]
    fn sort_aggregated_rows_by_change() {
        let positions = vec![
            Position::crypto("BTC", "Bitcoin", 1.0),
            Position::crypto("ETH", "Ether", 1.0),
        ];
        let map = prices(&[("btc", 100.0, -5.0), ("eth", 100.0, 8.0)]);
        let svc = AggregationService::new();
        let mut rows = svc.aggregate_by_symbol(&value(&positions, &map));
        svc.sort_rows(&mut rows, SortField::Change24h, SortDirection::Desc);
        assert_eq!(rows[0].symbol, "ETH");
    }

    #[test]
    fn dust_filter_keeps_debts_and_recomputes_allocation() {
        let assets = valued_at(&[
            ("BTC", AssetType::Crypto, 900.0),
            ("SHIB", AssetType::Crypto, 0.5),
            ("USDC", AssetType::Crypto, -0.2),
            ("ETH", AssetType::Crypto, 100.0),
        ]);
        let kept = AggregationService::new().filter_dust(&assets, 1.0);
        let symbols: Vec<&str> = kept.iter().map(|a| a.symbol()).collect();
        assert_eq!(symbols, vec!["BTC", "USDC", "ETH"]);
        assert!(approx(kept[0].allocation, 90.0));
    }

    #[test]
    fn summary_totals() {
        let positions = vec![
            Position::crypto("ETH", "Ether", 10.0),
            Position::crypto("USDC", "Loan", 5_000.0).as_debt(),
            Position::crypto("ETH", "Ether", 5.0),
        ];
        let map = prices(&[("eth", 2_000.0, 100.0), ("usdc", 1.0, 0.0)]);
        let summary = AggregationService::new().summarize(&value(&positions, &map));
        assert!(approx(summary.gross_assets, 30_000.0));
        assert!(approx(summary.total_debts, 5_000.0));
        assert!(approx(summary.total_value, 25_000.0));
        assert!(approx(summary.change_24h, 1_500.0));
        // 1500 on a value of 23500 a day ago
        assert!(approx(summary.change_percent_24h, 1_500.0 / 23_500.0 * 100.0));
        assert_eq!(summary.position_count, 3);
        assert_eq!(summary.unique_symbols, 2);
    }

    #[test]
    fn summary_of_empty_set() {
        let summary = AggregationService::new().summarize(&[]);
        assert_eq!(summary.total_value, 0.0);
        assert_eq!(summary.change_percent_24h, 0.0);
        assert_eq!(summary.position_count, 0);
    }
}

// ═══════════════════════════════════════════════════════════════════
// ExposureService
// ═══════════════════════════════════════════════════════════════════

mod exposure {
    use super::*;

    #[test]
    fn gross_net_long_short_relationships() {
        let assets = valued_at(&[
            ("BTC", AssetType::Crypto, 700.0),
            ("AAPL", AssetType::Stock, 300.0),
            ("USDC", AssetType::Crypto, -400.0),
        ]);
        let m = ExposureService::new().exposure(&assets);
        assert!(approx(m.long_exposure, 1_000.0));
        assert!(approx(m.short_exposure, 400.0));
        assert!(approx(m.gross_exposure, 1_400.0));
        assert!(approx(m.net_exposure, 600.0));
        assert!(m.gross_exposure >= m.net_exposure.abs());
        assert!(approx(m.long_exposure - m.short_exposure, m.net_exposure));
    }

    #[test]
    fn net_worth_and_leverage() {
        let assets = valued_at(&[
            ("ETH", AssetType::Crypto, 100_000.0),
            ("USDC", AssetType::Crypto, -50_000.0),
        ]);
        let m = ExposureService::new().exposure(&assets);
        assert!(approx(m.gross_assets, 100_000.0));
        assert!(approx(m.total_debts, 50_000.0));
        assert!(approx(m.net_worth, 50_000.0));
        assert!(approx(m.leverage, 3.0));
    }

    #[test]
    fn leverage_zero_when_underwater() {
        let assets = valued_at(&[
            ("ETH", AssetType::Crypto, 100.0),
            ("USDC", AssetType::Crypto, -150.0),
        ]);
        let m = ExposureService::new().exposure(&assets);
        assert!(m.net_worth < 0.0);
        assert_eq!(m.leverage, 0.0);
    }

    #[test]
    fn cash_percentage_counts_fiat_and_stablecoins() {
        let assets = valued_at(&[
            ("USD", AssetType::Cash, 200.0),
            ("USDC", AssetType::Crypto, 300.0),
            ("BTC", AssetType::Crypto, 500.0),
        ]);
        let m = ExposureService::new().exposure(&assets);
        assert!(approx(m.cash_percentage, 50.0));
    }

    #[test]
    fn empty_set_is_all_zero() {
        let m = ExposureService::new().exposure(&[]);
        assert_eq!(m.gross_exposure, 0.0);
        assert_eq!(m.leverage, 0.0);
        assert_eq!(m.cash_percentage, 0.0);
    }

    #[test]
    fn single_position_is_fully_concentrated() {
        let assets = valued_at(&[("BTC", AssetType::Crypto, 1_234.0)]);
        let c = ExposureService::new().concentration(&assets);
        assert_eq!(c.herfindahl_index, 10_000);
        assert!(approx(c.top1_percentage, 100.0));
        assert!(approx(c.top10_percentage, 100.0));
        assert_eq!(c.largest_symbol.as_deref(), Some("BTC"));
    }

    #[test]
    fn zero_total_concentration_is_zero() {
        let positions = vec![Position::crypto("A", "A", 1.0), Position::crypto("B", "B", 2.0)];
        let assets = value(&positions, &PriceMap::new());
        let c = ExposureService::new().concentration(&assets);
        assert_eq!(c.herfindahl_index, 0);
        assert_eq!(c.top1_percentage, 0.0);
        assert_eq!(c.position_count, 2);
        assert!(c.largest_symbol.is_none());
    }

    #[test]
    fn two_equal_positions_hhi_5000() {
        let assets = valued_at(&[
            ("BTC", AssetType::Crypto, 500.0),
            ("ETH", AssetType::Crypto, 500.0),
        ]);
        let c = ExposureService::new().concentration(&assets);
        assert_eq!(c.herfindahl_index, 5_000);
        assert!(approx(c.top1_percentage, 50.0));
    }

    #[test]
    fn top_n_over_absolute_values() {
        let assets = valued_at(&[
            ("A", AssetType::Crypto, 10.0),
            ("B", AssetType::Crypto, 20.0),
            ("C", AssetType::Crypto, -30.0),
            ("D", AssetType::Crypto, 5.0),
            ("E", AssetType::Crypto, 15.0),
            ("F", AssetType::Crypto, 20.0),
        ]);
        let c = ExposureService::new().concentration(&assets);
        // Σ|v| = 100; largest is the 30 debt
        assert_eq!(c.largest_symbol.as_deref(), Some("C"));
        assert!(approx(c.top1_percentage, 30.0));
        assert!(approx(c.top5_percentage, 95.0));
        assert!(approx(c.top10_percentage, 100.0));
        // 30² + 20² + 20² + 15² + 10² + 5²
        assert_eq!(c.herfindahl_index, 2_050);
    }

    #[test]
    fn exposure_by_bucket_splits_long_and_short() {
        let assets = valued_at(&[
            ("BTC", AssetType::Crypto, 800.0),
            ("USDC", AssetType::Crypto, 300.0),
            ("DAI", AssetType::Crypto, -100.0),
        ]);
        let buckets = ExposureService::new().exposure_by_bucket(&assets);
        assert_eq!(buckets[0].bucket, ExposureBucket::CryptoRisk);
        let cash = buckets
            .iter()
            .find(|b| b.bucket == ExposureBucket::CashEquivalent)
            .unwrap();
        assert!(approx(cash.long, 300.0));
        assert!(approx(cash.short, 100.0));
        assert!(approx(cash.net, 200.0));
        assert!(approx(cash.percentage_of_gross, 200.0 / 1_200.0 * 100.0));
    }
}

// ═══════════════════════════════════════════════════════════════════
// CategoryService
// ═══════════════════════════════════════════════════════════════════

mod categories {
    use super::*;

    fn classify(symbol: &str, asset_type: AssetType) -> (MainCategory, SubCategory, ExposureBucket) {
        let c = CategoryService::new().classify(symbol, asset_type);
        (c.main, c.sub, c.exposure)
    }

    #[test]
    fn table_entries() {
        assert_eq!(
            classify("BTC", AssetType::Crypto),
            (MainCategory::Crypto, SubCategory::Btc, ExposureBucket::CryptoRisk)
        );
        assert_eq!(
            classify("wsteth", AssetType::Crypto),
            (MainCategory::Crypto, SubCategory::Eth, ExposureBucket::CryptoRisk)
        );
        assert_eq!(
            classify("USDC", AssetType::Crypto),
            (MainCategory::Crypto, SubCategory::Stablecoins, ExposureBucket::CashEquivalent)
        );
        assert_eq!(
            classify("AAPL", AssetType::Stock),
            (MainCategory::Stock, SubCategory::Equities, ExposureBucket::Equity)
        );
        assert_eq!(
            classify("GLD", AssetType::Etf),
            (MainCategory::Stock, SubCategory::Etfs, ExposureBucket::Commodity)
        );
        assert_eq!(
            classify("IBIT", AssetType::Etf),
            (MainCategory::Stock, SubCategory::Etfs, ExposureBucket::CryptoRisk)
        );
        assert_eq!(
            classify("EUR", AssetType::Cash),
            (MainCategory::Cash, SubCategory::Fiat, ExposureBucket::CashEquivalent)
        );
        assert_eq!(
            classify("XAU", AssetType::Manual),
            (MainCategory::Metals, SubCategory::Gold, ExposureBucket::Commodity)
        );
        assert_eq!(
            classify("PAXG", AssetType::Crypto),
            (MainCategory::Metals, SubCategory::Gold, ExposureBucket::Commodity)
        );
    }

    #[test]
    fn fallback_by_asset_type() {
        assert_eq!(classify("PEPE", AssetType::Crypto).1, SubCategory::Tokens);
        assert_eq!(classify("ZZZZ", AssetType::Stock).1, SubCategory::Equities);
        assert_eq!(classify("ZZZZ", AssetType::Etf).1, SubCategory::Etfs);
        assert_eq!(
            classify("HUF", AssetType::Cash),
            (MainCategory::Cash, SubCategory::Fiat, ExposureBucket::CashEquivalent)
        );
        assert_eq!(
            classify("WATCH", AssetType::Manual),
            (MainCategory::Other, SubCategory::Unclassified, ExposureBucket::Unclassified)
        );
    }

    #[test]
    fn incompatible_table_entry_is_ignored() {
        // COMP the stock is not the Compound token
        assert_eq!(classify("COMP", AssetType::Stock).1, SubCategory::Equities);
        assert_eq!(classify("COMP", AssetType::Crypto).1, SubCategory::Defi);
    }

    #[test]
    fn override_takes_precedence() {
        let svc = CategoryService::new();
        let p = Position::crypto("PEPE", "Pepe", 1.0).with_override(MainCategory::Other);
        let c = svc.classify_position(&p);
        assert_eq!(c.main, MainCategory::Other);
        assert_eq!(c.sub, SubCategory::Unclassified);

        let metals = Position::new(AssetType::Manual, "COINS", "Gold coins", 3.0)
            .with_override(MainCategory::Metals);
        let c = svc.classify_position(&metals);
        assert_eq!(c.main, MainCategory::Metals);
        assert_eq!(c.sub, SubCategory::Gold);
        assert_eq!(c.sub.main(), MainCategory::Metals);
        assert_eq!(c.exposure, ExposureBucket::Commodity);
    }

    #[test]
    fn override_matching_table_keeps_detail() {
        let p = Position::crypto("BTC", "Bitcoin", 1.0).with_override(MainCategory::Crypto);
        assert_eq!(CategoryService::new().classify_position(&p).sub, SubCategory::Btc);
    }

    #[test]
    fn infer_asset_type() {
        let svc = CategoryService::new();
        assert_eq!(svc.infer_asset_type("aapl"), AssetType::Stock);
        assert_eq!(svc.infer_asset_type("SPY"), AssetType::Etf);
        assert_eq!(svc.infer_asset_type("EUR"), AssetType::Cash);
        assert_eq!(svc.infer_asset_type("XAG"), AssetType::Manual);
        assert_eq!(svc.infer_asset_type("BTC"), AssetType::Crypto);
        assert_eq!(svc.infer_asset_type("NEWCOIN"), AssetType::Crypto);
    }

    #[test]
    fn table_symbols_are_uppercase_and_unique() {
        let symbols = CategoryService::new().known_symbols();
        let mut seen = std::collections::HashSet::new();
        for s in &symbols {
            assert_eq!(*s, s.to_uppercase());
            assert!(seen.insert(*s), "duplicate table entry {s}");
        }
        assert!(CategoryService::new().is_known("brk.b"));
    }

    #[test]
    fn every_known_symbol_classifies_under_its_inferred_type() {
        let svc = CategoryService::new();
        for s in svc.known_symbols() {
            let c = svc.classify(s, svc.infer_asset_type(s));
            assert_ne!(c.sub, SubCategory::Unclassified, "{s} fell through");
        }
    }
}

// ═══════════════════════════════════════════════════════════════════
// SnapshotService
// ═══════════════════════════════════════════════════════════════════

mod snapshots {
    use super::*;

    #[test]
    fn build_snapshot_splits_categories() {
        let assets = valued_at(&[
            ("BTC", AssetType::Crypto, 1_000.0),
            ("AAPL", AssetType::Stock, 500.0),
            ("USD", AssetType::Cash, 250.0),
            ("XAU", AssetType::Manual, 100.0),
            ("USDC", AssetType::Crypto, -300.0),
        ]);
        let now = Utc::now();
        let s = SnapshotService::new().build_snapshot(&assets, now);
        assert_eq!(s.timestamp, now);
        assert!(approx(s.crypto_value, 700.0));
        assert!(approx(s.stock_value, 500.0));
        assert!(approx(s.cash_value, 250.0));
        assert!(approx(s.metals_value, 100.0));
        assert!(approx(s.total_debts, 300.0));
        assert!(approx(s.total_net_worth, 1_550.0));
    }

    #[test]
    fn record_if_due_respects_interval() {
        let svc = SnapshotService::new();
        let assets = valued_at(&[("BTC", AssetType::Crypto, 100.0)]);
        let mut history = Vec::new();
        let t0 = Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap();

        assert!(svc.record_if_due(&mut history, &assets, 24, t0).is_some());
        assert!(svc
            .record_if_due(&mut history, &assets, 24, t0 + Duration::hours(23))
            .is_none());
        assert!(svc
            .record_if_due(&mut history, &assets, 24, t0 + Duration::hours(24))
            .is_some());
        assert_eq!(history.len(), 2);
    }

    #[test]
    fn append_keeps_timestamp_order() {
        let svc = SnapshotService::new();
        let t0 = Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap();
        let mut history = Vec::new();
        SnapshotService::append(&mut history, svc.build_snapshot(&[], t0 + Duration::days(2)));
        SnapshotService::append(&mut history, svc.build_snapshot(&[], t0));
        SnapshotService::append(&mut history, svc.build_snapshot(&[], t0 + Duration::days(1)));
        let days: Vec<i64> = history.iter().map(|s| (s.timestamp - t0).num_days()).collect();
        assert_eq!(days, vec![0, 1, 2]);
    }

    #[test]
    fn history_is_inclusive_range() {
        let svc = SnapshotService::new();
        let t0 = Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap();
        let mut history = Vec::new();
        for d in 0..5 {
            SnapshotService::append(&mut history, svc.build_snapshot(&[], t0 + Duration::days(d)));
        }
        let slice = svc.history(&history, t0 + Duration::days(1), t0 + Duration::days(3));
        assert_eq!(slice.len(), 3);
    }
}

// ═══════════════════════════════════════════════════════════════════
// PortfolioService
// ═══════════════════════════════════════════════════════════════════

mod portfolio_ops {
    use super::*;

    #[test]
    fn add_and_remove_position() {
        let svc = PortfolioService::new();
        let mut state = PortfolioState::new();
        let id = svc
            .add_position(&mut state, Position::crypto("BTC", "Bitcoin", 1.0))
            .unwrap();
        assert_eq!(state.positions.len(), 1);
        let removed = svc.remove_position(&mut state, id).unwrap();
        assert_eq!(removed.symbol, "BTC");
        assert!(state.positions.is_empty());
    }

    #[test]
    fn add_rejects_invalid_amounts() {
        let svc = PortfolioService::new();
        let mut state = PortfolioState::new();
        for amount in [-1.0, f64::NAN, f64::INFINITY] {
            let result = svc.add_position(&mut state, Position::crypto("BTC", "Bitcoin", amount));
            assert!(matches!(result, Err(CoreError::ValidationError(_))));
        }
        assert!(state.positions.is_empty());
    }

    #[test]
    fn add_rejects_future_purchase_date() {
        let svc = PortfolioService::new();
        let mut state = PortfolioState::new();
        let mut p = Position::crypto("BTC", "Bitcoin", 1.0);
        p.purchase_date = Some(Utc::now().date_naive() + Duration::days(10));
        assert!(matches!(
            svc.add_position(&mut state, p),
            Err(CoreError::ValidationError(_))
        ));
    }

    #[test]
    fn add_rejects_unknown_account() {
        let svc = PortfolioService::new();
        let mut state = PortfolioState::new();
        let p = Position::crypto("BTC", "Bitcoin", 1.0).with_account(Uuid::new_v4());
        assert!(matches!(
            svc.add_position(&mut state, p),
            Err(CoreError::NotFound { .. })
        ));
    }

    #[test]
    fn add_rejects_duplicate_id() {
        let svc = PortfolioService::new();
        let mut state = PortfolioState::new();
        let p = Position::crypto("BTC", "Bitcoin", 1.0);
        svc.add_position(&mut state, p.clone()).unwrap();
        assert!(svc.add_position(&mut state, p).is_err());
        assert_eq!(state.positions.len(), 1);
    }

    #[test]
    fn update_applies_fields() {
        let svc = PortfolioService::new();
        let mut state = PortfolioState::new();
        let id = svc
            .add_position(&mut state, Position::crypto("ETH", "Ether", 1.0))
            .unwrap();
        let date = NaiveDate::from_ymd_opt(2023, 6, 1).unwrap();
        svc.update_position(
            &mut state,
            id,
            PositionUpdate {
                amount: Some(2.5),
                cost_basis: Some(Some(5_000.0)),
                purchase_date: Some(Some(date)),
                notes: Some(Some("staked".into())),
                ..PositionUpdate::default()
            },
        )
        .unwrap();
        let p = &state.positions[0];
        assert_eq!(p.amount, 2.5);
        assert_eq!(p.cost_basis, Some(5_000.0));
        assert_eq!(p.purchase_date, Some(date));
        assert_eq!(p.notes.as_deref(), Some("staked"));
    }

    #[test]
    fn update_with_no_fields_is_rejected() {
        let svc = PortfolioService::new();
        let mut state = PortfolioState::new();
        let id = svc
            .add_position(&mut state, Position::crypto("ETH", "Ether", 1.0))
            .unwrap();
        assert!(matches!(
            svc.update_position(&mut state, id, PositionUpdate::default()),
            Err(CoreError::ValidationError(_))
        ));
    }

    #[test]
    fn failed_update_leaves_position_untouched() {
        let svc = PortfolioService::new();
        let mut state = PortfolioState::new();
        let id = svc
            .add_position(&mut state, Position::crypto("ETH", "Ether", 1.0))
            .unwrap();
        let before = state.clone();
        let result = svc.update_position(
            &mut state,
            id,
            PositionUpdate {
                name: Some("Renamed".into()),
                amount: Some(-3.0),
                ..PositionUpdate::default()
            },
        );
        assert!(result.is_err());
        assert_eq!(state, before);
    }

    #[test]
    fn unknown_position_is_not_found() {
        let svc = PortfolioService::new();
        let mut state = PortfolioState::new();
        assert!(matches!(
            svc.remove_position(&mut state, Uuid::new_v4()),
            Err(CoreError::NotFound { .. })
        ));
    }

    #[test]
    fn accounts_validate_and_refuse_removal_while_linked() {
        let svc = PortfolioService::new();
        let mut state = PortfolioState::new();

        assert!(svc
            .add_cash_account(&mut state, CashAccount::new("Bad", "EURO"))
            .is_err());
        let cash_id = svc
            .add_cash_account(&mut state, CashAccount::new("Revolut", "EUR"))
            .unwrap();
        svc.add_position(
            &mut state,
            Position::cash("EUR", "Revolut", 100.0).with_account(cash_id),
        )
        .unwrap();

        assert!(matches!(
            svc.remove_account(&mut state, cash_id),
            Err(CoreError::ValidationError(_))
        ));
        let pos_id = state.positions[0].id;
        svc.remove_position(&mut state, pos_id).unwrap();
        svc.remove_account(&mut state, cash_id).unwrap();
        assert!(state.cash_accounts.is_empty());
    }

    #[test]
    fn duplicate_wallet_address_rejected() {
        let svc = PortfolioService::new();
        let mut state = PortfolioState::new();
        svc.add_wallet(&mut state, Wallet::new("A", "0xABC", vec![]))
            .unwrap();
        assert!(svc
            .add_wallet(&mut state, Wallet::new("B", "0xabc", vec![]))
            .is_err());
    }

    #[test]
    fn custom_price_set_and_remove() {
        let svc = PortfolioService::new();
        let mut state = PortfolioState::new();
        assert!(svc.set_custom_price(&mut state, "BTC", 0.0, None).is_err());
        svc.set_custom_price(&mut state, "BTC", 60_000.0, Some("OTC quote".into()))
            .unwrap();
        assert_eq!(state.custom_prices["btc"].price, 60_000.0);
        svc.remove_custom_price(&mut state, "btc").unwrap();
        assert!(matches!(
            svc.remove_custom_price(&mut state, "btc"),
            Err(CoreError::NotFound { .. })
        ));
    }
}
