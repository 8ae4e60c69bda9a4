//! Cost extraction from provider package detail records.
//!
//! The upstream API names cost fields inconsistently across line-item
//! categories and leaves most of them optional; this module normalizes a
//! detail record into a flat breakdown so nothing else has to know about
//! the provider's shape. Extraction is total: missing fields default to
//! zero or `None`, it never fails.

use serde::Serialize;

use crate::provider::{ItemCost, LineItem, PackageDetail};

/// Flat cost breakdown derived from one package detail record.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct CostBreakdown {
    /// Sum of transport line-item costs.
    pub air_cost: f64,
    /// Sum of hotel/transfer/tour/ticket/car line-item costs.
    pub land_cost: f64,
    /// Sum of agency fees across all categories.
    pub agency_fee: f64,
    /// First non-empty departure date across transports, in array order.
    pub departure_date: Option<String>,
    /// First non-empty marketing airline code across transports.
    pub airline_code: Option<String>,
    /// First non-empty airline display name across transports.
    pub airline_name: Option<String>,
    /// All transport flight numbers joined with "/".
    pub flight_numbers: Option<String>,
}

fn item_cost(cost: Option<&ItemCost>) -> f64 {
    cost.map(|c| c.net_provider_cost.or(c.total_price).unwrap_or(0.0))
        .unwrap_or(0.0)
}

fn item_fee(cost: Option<&ItemCost>) -> f64 {
    cost.and_then(|c| c.agency_fee).unwrap_or(0.0)
}

fn sum_land(items: &[LineItem]) -> (f64, f64) {
    items.iter().fold((0.0, 0.0), |(cost, fee), item| {
        (
            cost + item_cost(item.cost.as_ref()),
            fee + item_fee(item.cost.as_ref()),
        )
    })
}

fn first_non_empty<'a>(
    values: impl Iterator<Item = Option<&'a str>>,
) -> Option<String> {
    values
        .flatten()
        .find(|v| !v.trim().is_empty())
        .map(|v| v.to_string())
}

/// Extract a flat cost breakdown from a provider package detail.
pub fn extract_costs(detail: &PackageDetail) -> CostBreakdown {
    let mut air_cost = 0.0;
    let mut agency_fee = 0.0;
    for transport in &detail.transports {
        air_cost += item_cost(transport.cost.as_ref());
        agency_fee += item_fee(transport.cost.as_ref());
    }

    let mut land_cost = 0.0;
    for items in [
        &detail.hotels,
        &detail.transfers,
        &detail.tours,
        &detail.tickets,
        &detail.cars,
    ] {
        let (cost, fee) = sum_land(items);
        land_cost += cost;
        agency_fee += fee;
    }

    let departure_date = first_non_empty(
        detail
            .transports
            .iter()
            .map(|t| t.departure_date.as_deref()),
    );
    let airline_code = first_non_empty(
        detail
            .transports
            .iter()
            .map(|t| t.marketing_airline_code.as_deref()),
    );
    let airline_name = first_non_empty(detail.transports.iter().map(|t| t.airline_name.as_deref()));

    let flight_numbers: Vec<&str> = detail
        .transports
        .iter()
        .filter_map(|t| t.flight_numbers.as_deref())
        .filter(|f| !f.trim().is_empty())
        .collect();
    let flight_numbers = if flight_numbers.is_empty() {
        None
    } else {
        Some(flight_numbers.join("/"))
    };

    CostBreakdown {
        air_cost,
        land_cost,
        agency_fee,
        departure_date,
        airline_code,
        airline_name,
        flight_numbers,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::provider::TransportItem;

    fn cost(net: Option<f64>, total: Option<f64>, fee: Option<f64>) -> Option<ItemCost> {
        Some(ItemCost {
            net_provider_cost: net,
            total_price: total,
            agency_fee: fee,
        })
    }

    #[test]
    fn test_empty_detail_yields_zero_breakdown() {
        let breakdown = extract_costs(&PackageDetail::default());
        assert_eq!(breakdown, CostBreakdown::default());
    }

    #[test]
    fn test_all_missing_cost_fields_do_not_panic() {
        let detail = PackageDetail {
            transports: vec![TransportItem::default()],
            hotels: vec![LineItem { cost: None }],
            tours: vec![LineItem {
                cost: cost(None, None, None),
            }],
            ..PackageDetail::default()
        };

        let breakdown = extract_costs(&detail);
        assert_eq!(breakdown.air_cost, 0.0);
        assert_eq!(breakdown.land_cost, 0.0);
        assert_eq!(breakdown.agency_fee, 0.0);
        assert!(breakdown.departure_date.is_none());
    }

    #[test]
    fn test_net_cost_preferred_over_total_price() {
        let detail = PackageDetail {
            hotels: vec![LineItem {
                cost: cost(Some(100.0), Some(150.0), None),
            }],
            ..PackageDetail::default()
        };

        let breakdown = extract_costs(&detail);
        assert_eq!(breakdown.land_cost, 100.0);
    }

    #[test]
    fn test_total_price_fallback() {
        let detail = PackageDetail {
            hotels: vec![LineItem {
                cost: cost(None, Some(150.0), None),
            }],
            ..PackageDetail::default()
        };

        let breakdown = extract_costs(&detail);
        assert_eq!(breakdown.land_cost, 150.0);
    }

    #[test]
    fn test_transports_bucket_to_air_rest_to_land() {
        let detail = PackageDetail {
            transports: vec![TransportItem {
                cost: cost(Some(300.0), None, Some(10.0)),
                ..TransportItem::default()
            }],
            hotels: vec![LineItem {
                cost: cost(Some(500.0), None, Some(20.0)),
            }],
            transfers: vec![LineItem {
                cost: cost(None, Some(40.0), None),
            }],
            cars: vec![LineItem {
                cost: cost(Some(60.0), None, Some(5.0)),
            }],
            ..PackageDetail::default()
        };

        let breakdown = extract_costs(&detail);
        assert_eq!(breakdown.air_cost, 300.0);
        assert_eq!(breakdown.land_cost, 600.0);
        assert_eq!(breakdown.agency_fee, 35.0);
    }

    #[test]
    fn test_first_wins_flight_metadata() {
        let detail = PackageDetail {
            transports: vec![
                TransportItem {
                    departure_date: Some("".to_string()),
                    marketing_airline_code: None,
                    airline_name: Some("LATAM".to_string()),
                    flight_numbers: Some("LA800".to_string()),
                    ..TransportItem::default()
                },
                TransportItem {
                    departure_date: Some("2026-10-01".to_string()),
                    marketing_airline_code: Some("LA".to_string()),
                    airline_name: Some("Other Air".to_string()),
                    flight_numbers: Some("LA801".to_string()),
                    ..TransportItem::default()
                },
            ],
            ..PackageDetail::default()
        };

        let breakdown = extract_costs(&detail);
        // Blank first entry is skipped, not returned
        assert_eq!(breakdown.departure_date.as_deref(), Some("2026-10-01"));
        assert_eq!(breakdown.airline_code.as_deref(), Some("LA"));
        // First non-empty wins, in array order
        assert_eq!(breakdown.airline_name.as_deref(), Some("LATAM"));
        assert_eq!(breakdown.flight_numbers.as_deref(), Some("LA800/LA801"));
    }
}
