use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use validator::{Validate, ValidationError};

use super::{ReviewResponse, UserSummary};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type)]
#[sqlx(type_name = "property_type", rename_all = "lowercase")]
#[serde(rename_all = "lowercase")]
pub enum PropertyType {
    Apartment,
    House,
    Villa,
    Cabin,
    Condo,
    Other,
}

#[derive(Debug, Clone, FromRow)]
pub struct Listing {
    pub id: i64,
    pub host_id: i64,
    pub title: String,
    pub description: String,
    pub address: String,
    pub city: String,
    pub country: String,
    pub price_per_night: Decimal,
    pub property_type: PropertyType,
    pub max_guests: i32,
    pub bedrooms: i32,
    pub bathrooms: i32,
    pub has_wifi: bool,
    pub has_kitchen: bool,
    pub has_air_conditioning: bool,
    pub has_heating: bool,
    pub has_tv: bool,
    pub has_parking: bool,
    pub has_pool: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Short form of a listing, embedded in booking payloads.
#[derive(Debug, Clone, FromRow, Serialize)]
pub struct ListingSummary {
    pub id: i64,
    pub title: String,
    pub city: String,
    pub country: String,
    pub price_per_night: Decimal,
    pub max_guests: i32,
    pub host_id: i64,
}

#[derive(Debug, Serialize)]
pub struct ListingResponse {
    pub id: i64,
    pub title: String,
    pub description: String,
    pub address: String,
    pub city: String,
    pub country: String,
    pub price_per_night: Decimal,
    pub property_type: PropertyType,
    pub max_guests: i32,
    pub bedrooms: i32,
    pub bathrooms: i32,
    pub has_wifi: bool,
    pub has_kitchen: bool,
    pub has_air_conditioning: bool,
    pub has_heating: bool,
    pub has_tv: bool,
    pub has_parking: bool,
    pub has_pool: bool,
    pub created_at: DateTime<Utc>,
    pub host: Option<UserSummary>,
    pub reviews: Vec<ReviewResponse>,
    pub average_rating: Option<f64>,
}

impl ListingResponse {
    pub fn new(
        listing: Listing,
        host: Option<UserSummary>,
        reviews: Vec<ReviewResponse>,
        average_rating: Option<f64>,
    ) -> Self {
        ListingResponse {
            id: listing.id,
            title: listing.title,
            description: listing.description,
            address: listing.address,
            city: listing.city,
            country: listing.country,
            price_per_night: listing.price_per_night,
            property_type: listing.property_type,
            max_guests: listing.max_guests,
            bedrooms: listing.bedrooms,
            bathrooms: listing.bathrooms,
            has_wifi: listing.has_wifi,
            has_kitchen: listing.has_kitchen,
            has_air_conditioning: listing.has_air_conditioning,
            has_heating: listing.has_heating,
            has_tv: listing.has_tv,
            has_parking: listing.has_parking,
            has_pool: listing.has_pool,
            created_at: listing.created_at,
            host,
            reviews,
            average_rating,
        }
    }
}

pub(crate) fn validate_price(price: &Decimal) -> Result<(), ValidationError> {
    if price.is_sign_negative() {
        return Err(ValidationError::new("price_must_not_be_negative"));
    }
    if price.scale() > 2 {
        return Err(ValidationError::new("price_has_more_than_two_decimal_places"));
    }
    if *price > crate::services::pricing::max_amount() {
        return Err(ValidationError::new("price_has_more_than_ten_digits"));
    }
    Ok(())
}

// POST /api/listings, PUT /api/listings/{id}
#[derive(Debug, Clone, Deserialize, Validate)]
pub struct ListingPayload {
    #[validate(length(min = 1, max = 200))]
    pub title: String,
    pub description: String,
    #[validate(length(min = 1, max = 255))]
    pub address: String,
    #[validate(length(min = 1, max = 100))]
    pub city: String,
    #[validate(length(min = 1, max = 100))]
    pub country: String,
    #[validate(custom(function = "validate_price"))]
    pub price_per_night: Decimal,
    pub property_type: PropertyType,
    #[validate(range(min = 1))]
    pub max_guests: i32,
    #[validate(range(min = 0))]
    pub bedrooms: i32,
    #[validate(range(min = 0))]
    pub bathrooms: i32,
    #[serde(default)]
    pub has_wifi: bool,
    #[serde(default)]
    pub has_kitchen: bool,
    #[serde(default)]
    pub has_air_conditioning: bool,
    #[serde(default)]
    pub has_heating: bool,
    #[serde(default)]
    pub has_tv: bool,
    #[serde(default)]
    pub has_parking: bool,
    #[serde(default)]
    pub has_pool: bool,
}

// PATCH /api/listings/{id}
#[derive(Debug, Clone, Default, Deserialize, Validate)]
pub struct ListingPatch {
    #[validate(length(min = 1, max = 200))]
    pub title: Option<String>,
    pub description: Option<String>,
    #[validate(length(min = 1, max = 255))]
    pub address: Option<String>,
    #[validate(length(min = 1, max = 100))]
    pub city: Option<String>,
    #[validate(length(min = 1, max = 100))]
    pub country: Option<String>,
    #[validate(custom(function = "validate_price"))]
    pub price_per_night: Option<Decimal>,
    pub property_type: Option<PropertyType>,
    #[validate(range(min = 1))]
    pub max_guests: Option<i32>,
    #[validate(range(min = 0))]
    pub bedrooms: Option<i32>,
    #[validate(range(min = 0))]
    pub bathrooms: Option<i32>,
    pub has_wifi: Option<bool>,
    pub has_kitchen: Option<bool>,
    pub has_air_conditioning: Option<bool>,
    pub has_heating: Option<bool>,
    pub has_tv: Option<bool>,
    pub has_parking: Option<bool>,
    pub has_pool: Option<bool>,
}

impl From<ListingPayload> for ListingPatch {
    fn from(p: ListingPayload) -> Self {
        ListingPatch {
            title: Some(p.title),
            description: Some(p.description),
            address: Some(p.address),
            city: Some(p.city),
            country: Some(p.country),
            price_per_night: Some(p.price_per_night),
            property_type: Some(p.property_type),
            max_guests: Some(p.max_guests),
            bedrooms: Some(p.bedrooms),
            bathrooms: Some(p.bathrooms),
            has_wifi: Some(p.has_wifi),
            has_kitchen: Some(p.has_kitchen),
            has_air_conditioning: Some(p.has_air_conditioning),
            has_heating: Some(p.has_heating),
            has_tv: Some(p.has_tv),
            has_parking: Some(p.has_parking),
            has_pool: Some(p.has_pool),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;
    use serde_json::json;

    fn payload() -> serde_json::Value {
        json!({
            "title": "Loft by the river",
            "description": "Bright loft",
            "address": "1 Main St",
            "city": "Austin",
            "country": "United States",
            "price_per_night": "120.50",
            "property_type": "apartment",
            "max_guests": 4,
            "bedrooms": 2,
            "bathrooms": 1,
            "has_wifi": true
        })
    }

    #[test]
    fn payload_defaults_missing_amenities_to_false() {
        let p: ListingPayload = serde_json::from_value(payload()).unwrap();
        assert!(p.validate().is_ok());
        assert!(p.has_wifi);
        assert!(!p.has_pool);
        assert_eq!(p.price_per_night, dec!(120.50));
    }

    #[test]
    fn zero_capacity_is_rejected() {
        let mut raw = payload();
        raw["max_guests"] = json!(0);
        let p: ListingPayload = serde_json::from_value(raw).unwrap();
        let errors = p.validate().unwrap_err();
        assert!(errors.field_errors().contains_key("max_guests"));
    }

    #[test]
    fn negative_price_is_rejected() {
        let mut raw = payload();
        raw["price_per_night"] = json!("-1.00");
        let p: ListingPayload = serde_json::from_value(raw).unwrap();
        let errors = p.validate().unwrap_err();
        assert!(errors.field_errors().contains_key("price_per_night"));
    }

    #[test]
    fn price_beyond_ten_digits_is_rejected() {
        let mut raw = payload();
        raw["price_per_night"] = json!("100000000.00");
        let p: ListingPayload = serde_json::from_value(raw).unwrap();
        let errors = p.validate().unwrap_err();
        assert!(errors.field_errors().contains_key("price_per_night"));

        let mut raw = payload();
        raw["price_per_night"] = json!("99999999.99");
        let p: ListingPayload = serde_json::from_value(raw).unwrap();
        assert!(p.validate().is_ok());
    }

    #[test]
    fn unknown_property_type_fails_to_parse() {
        let mut raw = payload();
        raw["property_type"] = json!("castle");
        assert!(serde_json::from_value::<ListingPayload>(raw).is_err());
    }

    #[test]
    fn patch_validates_only_present_fields() {
        let patch = ListingPatch {
            city: Some(String::new()),
            ..Default::default()
        };
        assert!(patch.validate().is_err());
        assert!(ListingPatch::default().validate().is_ok());
    }
}
