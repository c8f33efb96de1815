//! The product aggregate, and the pure reducer that rebuilds it from an
//! ordered Event Stream.

use serde::{Deserialize, Serialize};

use crate::domain::event::{DecodeError, ProductEvent};
use crate::store::{EventEnvelope, SequenceNumber};

/// A price change requested through an update-price command, kept on the
/// aggregate as part of its pricing history.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PriceChangeRequest {
    /// The price that was requested.
    #[serde(rename = "requestedPrice")]
    pub requested_price: f32,

    /// When the request was recorded, in nanoseconds since the Unix epoch.
    #[serde(rename = "ts")]
    pub timestamp: i64,
}

/// Current state of a product, obtained by folding the events of its stream.
///
/// The same value doubles as the read model returned by the HTTP query
/// endpoints.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Product {
    /// Tenant bucket the product lives in.
    #[serde(rename = "ns")]
    pub namespace: String,

    /// Sequence number of the last event folded into this state.
    #[serde(rename = "sequenceNum")]
    pub sequence_num: SequenceNumber,

    /// Stock keeping unit, which is also the id of the product's stream.
    pub sku: String,

    /// Display title.
    pub title: String,

    /// Free-form description.
    pub description: String,

    /// Image URLs.
    pub images: Vec<String>,

    /// Index into `images` of the primary image.
    #[serde(rename = "primaryImgIdx")]
    pub primary_img_idx: usize,

    /// Canonical product page URL.
    pub url: String,

    /// Whether the product has been flagged as contraband.
    pub is_contraband: bool,

    /// Whether the product is currently active in the catalog.
    #[serde(rename = "isActive")]
    pub is_active: bool,

    /// Outcome of the most recent head check.
    #[serde(rename = "headCheckOk")]
    pub head_check_ok: bool,

    /// When the most recent head check was recorded, in nanoseconds since
    /// the Unix epoch. Zero until the first check.
    #[serde(rename = "lastHeadCheck")]
    pub last_head_check: i64,

    /// Current price.
    pub price: f32,

    /// Ordered history of requested price changes.
    #[serde(rename = "priceChangeRequests")]
    pub price_change_requests: Vec<PriceChangeRequest>,
}

/// Folds an ordered sequence of stored envelopes into the aggregate state.
///
/// The fold is pure: no I/O, no clocks, inputs are not mutated. An unknown
/// event type (or an undecodable payload) stops the fold and propagates.
///
/// Folding is associative over stream concatenation:
/// `reduce(a, xs ++ ys) == reduce(reduce(a, xs)?, ys)`.
pub fn reduce(initial: Product, events: &[EventEnvelope]) -> Result<Product, DecodeError> {
    events.iter().try_fold(initial, apply)
}

fn apply(product: Product, envelope: &EventEnvelope) -> Result<Product, DecodeError> {
    let event = ProductEvent::decode(&envelope.event_type, &envelope.data)?;

    let mut product = match event {
        // The created event replaces the state wholesale with the embedded
        // product. It is the only event legally allowed to open a stream;
        // later occurrences reset the state the same way.
        ProductEvent::Created(created) => created.product,
        ProductEvent::AttribsUpdated(update) => Product {
            title: update.title,
            description: update.description,
            url: update.url,
            ..product
        },
        ProductEvent::ImagesUpdated(update) => Product {
            images: update.images,
            primary_img_idx: update.primary_img_idx,
            ..product
        },
        ProductEvent::PriceUpdated(update) => {
            let mut product = product;
            product.price_change_requests.push(PriceChangeRequest {
                requested_price: update.price,
                timestamp: envelope.timestamp,
            });
            product.price = update.price;
            product
        },
        ProductEvent::HeadCheckPerformed(check) => Product {
            head_check_ok: check.success,
            last_head_check: envelope.timestamp,
            ..product
        },
        ProductEvent::ActiveStateSet(set) => Product {
            is_active: set.active,
            ..product
        },
    };

    product.sequence_num = envelope.seq_num;
    Ok(product)
}
