//! Built-in rule set and its documentation strings.

use serde_json::json;

use crate::{
    rules::{FieldRule, FieldType, RuleSet},
    transforms::Transformation,
    validators::Validation,
};

/// The rule set a [`crate::FieldMapper`] starts from.
///
/// Contact identity is required; every other category is optional and
/// several fields carry defaults.
pub fn default_rules() -> RuleSet {
    RuleSet::new()
        // contact
        .with(
            "contact",
            "firstName",
            FieldRule::new(FieldType::string_max(50), &[
                "firstName",
                "first_name",
                "fname",
                "given_name",
            ])
            .required(),
        )
        .with(
            "contact",
            "lastName",
            FieldRule::new(FieldType::string_max(50), &[
                "lastName",
                "last_name",
                "lname",
                "family_name",
                "surname",
            ])
            .required(),
        )
        .with(
            "contact",
            "email",
            FieldRule::new(FieldType::Email, &["email", "emailAddress", "email_address", "mail"])
                .required()
                .validated(Validation::Email),
        )
        .with(
            "contact",
            "phone",
            FieldRule::new(FieldType::Phone, &[
                "phone",
                "phoneNumber",
                "phone_number",
                "mobile",
                "cell",
                "telephone",
            ])
            .required()
            .validated(Validation::Phone),
        )
        // address
        .with(
            "address",
            "address",
            FieldRule::new(FieldType::string_max(200), &[
                "address",
                "street",
                "street_address",
                "address1",
                "property_address",
            ]),
        )
        .with(
            "address",
            "address2",
            FieldRule::new(FieldType::string_max(100), &[
                "address2",
                "apt",
                "apartment",
                "unit",
                "suite",
            ]),
        )
        .with(
            "address",
            "city",
            FieldRule::new(FieldType::string_max(50), &["city", "locality", "town"]),
        )
        .with(
            "address",
            "state",
            FieldRule::new(FieldType::string_max(50), &[
                "state",
                "province",
                "region",
                "state_province",
            ])
            .transformed(Transformation::StateCode),
        )
        .with(
            "address",
            "postalCode",
            FieldRule::new(FieldType::string(), &[
                "postalCode",
                "zipCode",
                "zip",
                "postal_code",
                "zip_code",
            ])
            .validated(Validation::PostalCode),
        )
        .with(
            "address",
            "country",
            FieldRule::new(FieldType::string(), &["country", "country_code"])
                .with_default("US")
                .transformed(Transformation::CountryCode),
        )
        // roofing
        .with(
            "roofing",
            "propertyType",
            FieldRule::new(
                FieldType::select(&["residential", "commercial", "industrial", "multi-family"]),
                &["propertyType", "property_type", "building_type"],
            )
            .with_default("residential"),
        )
        .with(
            "roofing",
            "roofType",
            FieldRule::new(
                FieldType::select(&["asphalt", "metal", "tile", "slate", "wood", "flat", "other"]),
                &["roofType", "roof_type", "roofing_type"],
            ),
        )
        .with(
            "roofing",
            "roofAge",
            FieldRule::new(
                FieldType::select(&["0-5", "6-10", "11-15", "16-20", "21-30", "30+", "unknown"]),
                &["roofAge", "roof_age", "age_of_roof"],
            ),
        )
        .with(
            "roofing",
            "roofSize",
            FieldRule::new(FieldType::string(), &["roofSize", "roof_size", "square_footage"])
                .validated(Validation::RoofSize),
        )
        .with(
            "roofing",
            "roofCondition",
            FieldRule::new(
                FieldType::select(&["excellent", "good", "fair", "poor", "needs_replacement"]),
                &["roofCondition", "roof_condition", "condition"],
            ),
        )
        // service
        .with(
            "service",
            "serviceType",
            FieldRule::new(
                FieldType::select(&[
                    "estimate",
                    "repair",
                    "replacement",
                    "inspection",
                    "maintenance",
                    "emergency",
                    "consultation",
                ]),
                &["serviceType", "service_type", "service_needed", "request_type"],
            )
            .with_default("estimate"),
        )
        .with(
            "service",
            "urgency",
            FieldRule::new(FieldType::select(&["emergency", "urgent", "normal", "flexible"]), &[
                "urgency", "priority", "timeline",
            ])
            .with_default("normal"),
        )
        .with(
            "service",
            "preferredContactTime",
            FieldRule::new(
                FieldType::select(&["morning", "afternoon", "evening", "anytime"]),
                &["preferredContactTime", "contact_time", "best_time_to_call"],
            )
            .with_default("anytime"),
        )
        .with(
            "service",
            "budget",
            FieldRule::new(
                FieldType::select(&[
                    "under_5k", "5k_10k", "10k_20k", "20k_50k", "over_50k", "not_sure",
                ]),
                &["budget", "estimated_budget", "price_range"],
            ),
        )
        // attribution
        .with(
            "attribution",
            "source",
            FieldRule::new(FieldType::string(), &[
                "source",
                "utm_source",
                "lead_source",
                "referral_source",
            ])
            .with_default("website"),
        )
        .with(
            "attribution",
            "medium",
            FieldRule::new(FieldType::string(), &["medium", "utm_medium", "marketing_medium"])
                .with_default("organic"),
        )
        .with(
            "attribution",
            "campaign",
            FieldRule::new(FieldType::string(), &["campaign", "utm_campaign", "campaign_name"]),
        )
        .with(
            "attribution",
            "term",
            FieldRule::new(FieldType::string(), &["term", "utm_term", "keyword"]),
        )
        .with(
            "attribution",
            "content",
            FieldRule::new(FieldType::string(), &["content", "utm_content", "ad_content"]),
        )
        // additional
        .with(
            "additional",
            "notes",
            FieldRule::new(FieldType::text_max(2000), &[
                "notes",
                "message",
                "comments",
                "description",
                "details",
            ]),
        )
        .with(
            "additional",
            "tags",
            FieldRule::new(FieldType::Array, &["tags", "categories", "labels"])
                .with_default(json!(["website-lead"])),
        )
        .with(
            "additional",
            "customFields",
            FieldRule::new(FieldType::Object, &["customFields", "custom_fields", "additional_data"]),
        )
        .with(
            "additional",
            "leadScore",
            FieldRule::new(FieldType::number_between(0.0, 100.0), &[
                "leadScore",
                "lead_score",
                "score",
            ]),
        )
}

/// Human-readable description of a category.
pub fn category_description(category: &str) -> &'static str {
    match category {
        "contact" => "Basic contact information for the lead",
        "address" => "Property and mailing address information",
        "roofing" => "Roofing-specific property details",
        "service" => "Service request and preference information",
        "attribution" => "Marketing attribution and tracking data",
        "additional" => "Additional notes and custom fields",
        _ => "Category description not available",
    }
}

/// Human-readable description of a canonical field.
pub fn field_description(field: &str) -> &'static str {
    match field {
        "firstName" => "Lead's first name",
        "lastName" => "Lead's last name",
        "email" => "Primary email address",
        "phone" => "Primary phone number",
        "address" => "Street address of property",
        "address2" => "Apartment, unit or suite",
        "city" => "City name",
        "state" => "State or province",
        "postalCode" => "ZIP or postal code",
        "country" => "Country code (default: US)",
        "propertyType" => "Type of property (residential, commercial, etc.)",
        "roofType" => "Current roofing material type",
        "roofAge" => "Age range of current roof",
        "roofSize" => "Approximate size of roof area",
        "roofCondition" => "Current condition of roof",
        "serviceType" => "Type of service requested",
        "urgency" => "Urgency level of request",
        "preferredContactTime" => "Best time to contact lead",
        "budget" => "Estimated budget range",
        "source" => "Lead source (e.g., website, referral)",
        "medium" => "Marketing medium",
        "campaign" => "Marketing campaign name",
        "term" => "Paid search keyword",
        "content" => "Ad or link variant",
        "notes" => "Additional notes or comments",
        "tags" => "Categorization tags for the lead",
        "customFields" => "Free-form source-specific data",
        "leadScore" => "Lead quality score from 0 to 100",
        _ => "Field description not available",
    }
}
