//! Commands accepted at the service boundary.
//!
//! Commands arrive as JSON with a `commandType` discriminator; parsing is
//! tag-first, like the event codec. A command is a request to do something
//! that has not been done yet; the processor decides whether it becomes an
//! event.

use serde::{Deserialize, Serialize};

use crate::domain::product::Product;

/// Tag of [`ProductCommand::Create`].
pub const CREATE_PRODUCT: &str = "create-product";
/// Tag of [`ProductCommand::UpdateAttributes`].
pub const UPDATE_PRODUCT_ATTRIBS: &str = "update-product-attribs";
/// Tag of [`ProductCommand::UpdateImages`].
pub const UPDATE_PRODUCT_IMAGES: &str = "update-product-images";
/// Tag of [`ProductCommand::UpdatePrice`].
pub const UPDATE_PRODUCT_PRICE: &str = "update-product-price";
/// Tag of [`ProductCommand::HeadCheck`].
pub const PRODUCT_HEAD_CHECK: &str = "product-headcheck";
/// Tag of [`ProductCommand::SetActive`].
pub const PRODUCT_SET_ACTIVE: &str = "product-set-active";

/// Fields carried by every command. The boundary stamps `timestamp` and
/// `uid` when the client did not provide them.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CommandMeta {
    #[serde(rename = "ns")]
    pub namespace: String,
    pub sku: String,
    /// Seconds since the Unix epoch.
    #[serde(rename = "ts")]
    pub timestamp: i64,
    /// Server-generated unique id of this command instance. Commands are
    /// not deduplicated by it: two identical commands yield two events.
    pub uid: String,
}

/// A request to create a product that explicitly does not exist yet.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CreateProduct {
    #[serde(flatten)]
    pub meta: CommandMeta,
    #[serde(default)]
    pub source: String,
    pub product: Product,
}

/// Updates attributes that need no special handling or verification.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UpdateAttributes {
    #[serde(flatten)]
    pub meta: CommandMeta,
    #[serde(default)]
    pub title: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub url: String,
}

/// Replaces the product's image set.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UpdateImages {
    #[serde(flatten)]
    pub meta: CommandMeta,
    #[serde(default)]
    pub images: Vec<String>,
    #[serde(rename = "primaryImgIdx", default)]
    pub primary_img_idx: usize,
}

/// Requests a price change.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UpdatePrice {
    #[serde(flatten)]
    pub meta: CommandMeta,
    /// Aggregate version the client based its request on. Carried on the
    /// wire; the processor re-reads the stream head under its own
    /// optimistic check.
    #[serde(default)]
    pub version: i64,
    pub price: f32,
}

/// Requests a head check against the product's canonical URL.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HeadCheck {
    #[serde(flatten)]
    pub meta: CommandMeta,
    #[serde(default)]
    pub reason: String,
}

/// Activates or deactivates the product.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SetActive {
    #[serde(flatten)]
    pub meta: CommandMeta,
    pub active: bool,
}

/// All commands the service accepts.
#[derive(Debug, Clone, PartialEq)]
pub enum ProductCommand {
    Create(CreateProduct),
    UpdateAttributes(UpdateAttributes),
    UpdateImages(UpdateImages),
    UpdatePrice(UpdatePrice),
    HeadCheck(HeadCheck),
    SetActive(SetActive),
}

/// All possible error types returned by [`ProductCommand::parse`].
#[derive(Debug, thiserror::Error)]
pub enum ParseError {
    /// The discriminator does not name any known command.
    #[error("unknown command type: {0}")]
    UnknownCommandType(String),

    /// The discriminator was recognized, but the payload does not parse
    /// into the command's fields.
    #[error("failed to decode {command_type} command payload: {source}")]
    Payload {
        /// The tag the payload was decoded against.
        command_type: String,
        #[source]
        source: serde_json::Error,
    },
}

impl ProductCommand {
    /// Returns the stable tag identifying this command variant.
    pub fn command_type(&self) -> &'static str {
        match self {
            ProductCommand::Create(_) => CREATE_PRODUCT,
            ProductCommand::UpdateAttributes(_) => UPDATE_PRODUCT_ATTRIBS,
            ProductCommand::UpdateImages(_) => UPDATE_PRODUCT_IMAGES,
            ProductCommand::UpdatePrice(_) => UPDATE_PRODUCT_PRICE,
            ProductCommand::HeadCheck(_) => PRODUCT_HEAD_CHECK,
            ProductCommand::SetActive(_) => PRODUCT_SET_ACTIVE,
        }
    }

    /// The fields common to every command.
    pub fn meta(&self) -> &CommandMeta {
        match self {
            ProductCommand::Create(cmd) => &cmd.meta,
            ProductCommand::UpdateAttributes(cmd) => &cmd.meta,
            ProductCommand::UpdateImages(cmd) => &cmd.meta,
            ProductCommand::UpdatePrice(cmd) => &cmd.meta,
            ProductCommand::HeadCheck(cmd) => &cmd.meta,
            ProductCommand::SetActive(cmd) => &cmd.meta,
        }
    }

    /// Parses the tag to choose a variant, then the payload into that
    /// variant's fields. Unknown payload fields (such as the discriminator
    /// itself) are ignored.
    pub fn parse(command_type: &str, payload: serde_json::Value) -> Result<Self, ParseError> {
        let payload_error = |source| ParseError::Payload {
            command_type: command_type.to_owned(),
            source,
        };

        match command_type {
            CREATE_PRODUCT => serde_json::from_value(payload)
                .map(ProductCommand::Create)
                .map_err(payload_error),
            UPDATE_PRODUCT_ATTRIBS => serde_json::from_value(payload)
                .map(ProductCommand::UpdateAttributes)
                .map_err(payload_error),
            UPDATE_PRODUCT_IMAGES => serde_json::from_value(payload)
                .map(ProductCommand::UpdateImages)
                .map_err(payload_error),
            UPDATE_PRODUCT_PRICE => serde_json::from_value(payload)
                .map(ProductCommand::UpdatePrice)
                .map_err(payload_error),
            PRODUCT_HEAD_CHECK => serde_json::from_value(payload)
                .map(ProductCommand::HeadCheck)
                .map_err(payload_error),
            PRODUCT_SET_ACTIVE => serde_json::from_value(payload)
                .map(ProductCommand::SetActive)
                .map_err(payload_error),
            unknown => Err(ParseError::UnknownCommandType(unknown.to_owned())),
        }
    }
}
