use std::cmp::Ordering;

use crate::models::analytics::{BucketExposure, ConcentrationMetrics, ExposureMetrics};
use crate::models::category::ExposureBucket;
use crate::models::valued::AssetWithPrice;

use super::category_service::CategoryService;

/// Exposure, leverage and concentration over a valued set.
///
/// Debt convention: a debt is a short exposure. It counts toward gross
/// exposure, never toward gross assets, and it reduces net worth.
pub struct ExposureService {
    category_service: CategoryService,
}

impl ExposureService {
    pub fn new() -> Self {
        Self {
            category_service: CategoryService::new(),
        }
    }

    pub fn exposure(&self, assets: &[AssetWithPrice]) -> ExposureMetrics {
        let long_exposure: f64 = assets.iter().map(|a| a.value).filter(|v| *v > 0.0).sum();
        let short_exposure: f64 = assets
            .iter()
            .map(|a| a.value)
            .filter(|v| *v < 0.0)
            .map(f64::abs)
            .sum();
        let gross_exposure = long_exposure + short_exposure;
        let net_exposure = long_exposure - short_exposure;

        let gross_assets = long_exposure;
        let total_debts = short_exposure;
        let net_worth = gross_assets - total_debts;

        let leverage = if net_worth > 0.0 {
            gross_exposure / net_worth
        } else {
            0.0
        };

        let cash_value: f64 = assets
            .iter()
            .filter(|a| a.value > 0.0)
            .filter(|a| {
                self.category_service
                    .classify_position(&a.position)
                    .exposure
                    .is_cash_like()
            })
            .map(|a| a.value)
            .sum();
        let cash_percentage = if gross_assets > 0.0 {
            cash_value / gross_assets * 100.0
        } else {
            0.0
        };

        ExposureMetrics {
            gross_exposure,
            net_exposure,
            long_exposure,
            short_exposure,
            gross_assets,
            total_debts,
            net_worth,
            leverage,
            cash_percentage,
        }
    }

    /// Top-N shares and the Herfindahl-Hirschman index.
    ///
    /// Shares are |value| / Σ|value| × 100 over every asset passed in, so the
    /// HHI runs from near 0 (fully spread) to 10000 (one holding).
    pub fn concentration(&self, assets: &[AssetWithPrice]) -> ConcentrationMetrics {
        let mut ranked: Vec<(&str, f64)> = assets
            .iter()
            .map(|a| (a.position.symbol.as_str(), a.value.abs()))
            .collect();
        ranked.sort_by(|a, b| b.1.partial_cmp(&a.1).unwrap_or(Ordering::Equal));

        let total: f64 = ranked.iter().map(|(_, v)| v).sum();
        if total <= 0.0 {
            return ConcentrationMetrics {
                position_count: assets.len(),
                ..ConcentrationMetrics::default()
            };
        }

        let share = |v: f64| v / total * 100.0;
        let top_n = |n: usize| ranked.iter().take(n).map(|(_, v)| share(*v)).sum::<f64>();
        let hhi: f64 = ranked.iter().map(|(_, v)| share(*v).powi(2)).sum();

        ConcentrationMetrics {
            top1_percentage: top_n(1),
            top5_percentage: top_n(5),
            top10_percentage: top_n(10),
            herfindahl_index: hhi.round() as u32,
            position_count: assets.len(),
            largest_symbol: ranked.first().map(|(s, _)| s.to_string()),
        }
    }

    /// Long/short split per exposure bucket, largest gross first.
    pub fn exposure_by_bucket(&self, assets: &[AssetWithPrice]) -> Vec<BucketExposure<ExposureBucket>> {
        let mut buckets: Vec<BucketExposure<ExposureBucket>> = Vec::new();
        for asset in assets {
            let bucket = self.category_service.classify_position(&asset.position).exposure;
            let idx = match buckets.iter().position(|b| b.bucket == bucket) {
                Some(i) => i,
                None => {
                    buckets.push(BucketExposure {
                        bucket,
                        long: 0.0,
                        short: 0.0,
                        net: 0.0,
                        percentage_of_gross: 0.0,
                    });
                    buckets.len() - 1
                }
            };
            if asset.value >= 0.0 {
                buckets[idx].long += asset.value;
            } else {
                buckets[idx].short += asset.value.abs();
            }
        }

        let gross: f64 = buckets.iter().map(|b| b.long + b.short).sum();
        for b in &mut buckets {
            b.net = b.long - b.short;
            b.percentage_of_gross = if gross > 0.0 { b.net / gross * 100.0 } else { 0.0 };
        }
        buckets.sort_by(|a, b| {
            (b.long + b.short)
                .partial_cmp(&(a.long + a.short))
                .unwrap_or(Ordering::Equal)
        });
        buckets
    }
}

impl Default for ExposureService {
    fn default() -> Self {
        Self::new()
    }
}
