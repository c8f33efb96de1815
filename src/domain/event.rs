//! Domain Events of the product catalog and their persistence codec.
//!
//! The `event_type` tag stored on the envelope is the canonical variant
//! discriminator; payloads are self-describing JSON. Decoding dispatches on
//! the tag first, then parses the payload into the matching variant.

use serde::{Deserialize, Serialize};

use crate::domain::product::Product;
use crate::store::EventEnvelope;

/// Tag of [`ProductEvent::Created`].
pub const PRODUCT_CREATED: &str = "prodCreated-1";
/// Tag of [`ProductEvent::AttribsUpdated`].
pub const ATTRIBS_UPDATED: &str = "attrUpd-1";
/// Tag of [`ProductEvent::ImagesUpdated`].
pub const IMAGES_UPDATED: &str = "imgUpd-1";
/// Tag of [`ProductEvent::PriceUpdated`].
pub const PRICE_UPDATED: &str = "priceUpd-1";
/// Tag of [`ProductEvent::HeadCheckPerformed`].
pub const HEAD_CHECK_PERFORMED: &str = "headcheck-1";
/// Tag of [`ProductEvent::ActiveStateSet`].
pub const ACTIVE_STATE_SET: &str = "setactivestate-1";

/// A product entered the catalog, carrying its full initial state.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProductCreated {
    #[serde(rename = "ns")]
    pub namespace: String,
    pub sku: String,
    /// Where the product record originated (feed, manual entry, ..).
    #[serde(default)]
    pub source: String,
    pub product: Product,
}

/// Title, description or URL changed.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AttribsUpdated {
    #[serde(rename = "ns")]
    pub namespace: String,
    pub sku: String,
    pub title: String,
    pub description: String,
    pub url: String,
}

/// The image set was replaced.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ImagesUpdated {
    #[serde(rename = "ns")]
    pub namespace: String,
    pub sku: String,
    pub images: Vec<String>,
    #[serde(rename = "primaryImgIdx")]
    pub primary_img_idx: usize,
}

/// A price change was accepted.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PriceUpdated {
    #[serde(rename = "ns")]
    pub namespace: String,
    pub sku: String,
    pub price: f32,
}

/// A head check ran against the product's canonical URL.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HeadCheckPerformed {
    #[serde(rename = "ns")]
    pub namespace: String,
    pub sku: String,
    pub reason: String,
    pub success: bool,
    pub info: String,
}

/// The product was activated or deactivated.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ActiveStateSet {
    #[serde(rename = "ns")]
    pub namespace: String,
    pub sku: String,
    pub active: bool,
}

/// All Domain Events a product stream can carry.
#[derive(Debug, Clone, PartialEq)]
pub enum ProductEvent {
    Created(ProductCreated),
    AttribsUpdated(AttribsUpdated),
    ImagesUpdated(ImagesUpdated),
    PriceUpdated(PriceUpdated),
    HeadCheckPerformed(HeadCheckPerformed),
    ActiveStateSet(ActiveStateSet),
}

/// All possible error types returned by [`ProductEvent::decode`].
#[derive(Debug, thiserror::Error)]
pub enum DecodeError {
    /// The tag does not name any known event variant.
    #[error("unknown event type: {0}")]
    UnknownEventType(String),

    /// The tag was recognized, but the payload does not parse into the
    /// variant's fields.
    #[error("failed to decode {event_type} payload: {source}")]
    Payload {
        /// The tag the payload was decoded against.
        event_type: String,
        #[source]
        source: serde_json::Error,
    },
}

impl ProductEvent {
    /// Returns the stable tag identifying this event variant.
    pub fn event_type(&self) -> &'static str {
        match self {
            ProductEvent::Created(_) => PRODUCT_CREATED,
            ProductEvent::AttribsUpdated(_) => ATTRIBS_UPDATED,
            ProductEvent::ImagesUpdated(_) => IMAGES_UPDATED,
            ProductEvent::PriceUpdated(_) => PRICE_UPDATED,
            ProductEvent::HeadCheckPerformed(_) => HEAD_CHECK_PERFORMED,
            ProductEvent::ActiveStateSet(_) => ACTIVE_STATE_SET,
        }
    }

    /// Serializes the event payload into its JSON byte form.
    pub fn encode(&self) -> Vec<u8> {
        match self {
            ProductEvent::Created(event) => serde_json::to_vec(event),
            ProductEvent::AttribsUpdated(event) => serde_json::to_vec(event),
            ProductEvent::ImagesUpdated(event) => serde_json::to_vec(event),
            ProductEvent::PriceUpdated(event) => serde_json::to_vec(event),
            ProductEvent::HeadCheckPerformed(event) => serde_json::to_vec(event),
            ProductEvent::ActiveStateSet(event) => serde_json::to_vec(event),
        }
        .expect("json serialization should not fail")
    }

    /// Parses the tag to choose a variant, then the payload into that
    /// variant's fields.
    pub fn decode(event_type: &str, data: &[u8]) -> Result<Self, DecodeError> {
        let payload_error = |source| DecodeError::Payload {
            event_type: event_type.to_owned(),
            source,
        };

        match event_type {
            PRODUCT_CREATED => serde_json::from_slice(data)
                .map(ProductEvent::Created)
                .map_err(payload_error),
            ATTRIBS_UPDATED => serde_json::from_slice(data)
                .map(ProductEvent::AttribsUpdated)
                .map_err(payload_error),
            IMAGES_UPDATED => serde_json::from_slice(data)
                .map(ProductEvent::ImagesUpdated)
                .map_err(payload_error),
            PRICE_UPDATED => serde_json::from_slice(data)
                .map(ProductEvent::PriceUpdated)
                .map_err(payload_error),
            HEAD_CHECK_PERFORMED => serde_json::from_slice(data)
                .map(ProductEvent::HeadCheckPerformed)
                .map_err(payload_error),
            ACTIVE_STATE_SET => serde_json::from_slice(data)
                .map(ProductEvent::ActiveStateSet)
                .map_err(payload_error),
            unknown => Err(DecodeError::UnknownEventType(unknown.to_owned())),
        }
    }

    /// Wraps the encoded event in a store envelope. The sequence number is
    /// left at zero, to be assigned by the store on append.
    pub fn into_envelope(self, timestamp: i64) -> EventEnvelope {
        EventEnvelope {
            seq_num: 0,
            timestamp,
            event_type: self.event_type().to_owned(),
            data: self.encode(),
        }
    }
}
