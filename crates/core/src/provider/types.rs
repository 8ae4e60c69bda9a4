use serde::Deserialize;

/// A package detail record as returned by the provider.
///
/// The upstream API ships parallel lists of line items per category; every
/// cost field on them is optional and inconsistently populated.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PackageDetail {
    #[serde(default)]
    pub transports: Vec<TransportItem>,
    #[serde(default)]
    pub hotels: Vec<LineItem>,
    #[serde(default)]
    pub transfers: Vec<LineItem>,
    #[serde(default)]
    pub tours: Vec<LineItem>,
    #[serde(default)]
    pub tickets: Vec<LineItem>,
    #[serde(default)]
    pub cars: Vec<LineItem>,
    #[serde(default)]
    pub destinations: Vec<String>,
}

/// Cost fields shared by all line-item categories.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ItemCost {
    #[serde(default)]
    pub net_provider_cost: Option<f64>,
    #[serde(default)]
    pub total_price: Option<f64>,
    #[serde(default)]
    pub agency_fee: Option<f64>,
}

/// A non-transport line item (hotel, transfer, tour, ticket, car).
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LineItem {
    #[serde(default)]
    pub cost: Option<ItemCost>,
}

/// A transport (flight) line item, carrying the primary flight metadata.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TransportItem {
    #[serde(default)]
    pub cost: Option<ItemCost>,
    #[serde(default)]
    pub departure_date: Option<String>,
    #[serde(default)]
    pub marketing_airline_code: Option<String>,
    #[serde(default)]
    pub airline_name: Option<String>,
    #[serde(default)]
    pub flight_numbers: Option<String>,
}
