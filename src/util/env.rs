//! Environment-backed configuration.
//!
//! The deserializer here follows the approach of the [`envy`] crate: every `(NAME, value)` pair
//! becomes a map entry, so a struct annotated with `rename_all = "SCREAMING_SNAKE_CASE"` can be
//! filled straight from the process environment. Values that look like lists (`A,B,C`) are split
//! on commas when the target field is a sequence, and empty values are treated as unset.
//!
//! [`envy`]: https://github.com/softprops/envy

use std::iter::empty;
use std::path::PathBuf;

use serde::Deserialize;
use serde::de::value::{MapDeserializer, SeqDeserializer};
use serde::de::{self, IntoDeserializer};
use thiserror::Error;

use crate::constants;

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub struct Env {
    #[serde(default = "default_port")]
    pub server_api_port: u16,
    #[serde(default = "default_database_path")]
    pub database_path: String,
    #[serde(default = "default_cors")]
    pub cors_allow_origins: String,
    #[serde(default = "default_site_url")]
    pub site_url: String,
    #[serde(default = "default_layers_dir")]
    pub layers_dir: PathBuf,

    pub helius_api_key: Option<String>,
    pub solana_rpc: Option<String>,
    #[serde(default = "default_helius_rest_url")]
    pub helius_rest_url: String,
    pub collection_id: Option<String>,
    #[serde(default)]
    pub creator_allowlist: Vec<String>,

    pub x_bearer_token: Option<String>,
    #[serde(default = "default_x_api_url")]
    pub x_api_url: String,
    #[serde(default = "default_hashtags")]
    pub promo_hashtags: String,
    #[serde(default)]
    pub promo_mention: String,
    #[serde(default = "default_total_cap")]
    pub promo_daily_total_cap: i64,
    #[serde(default = "default_retweet_cap")]
    pub promo_daily_retweet_cap: i64,
    #[serde(default = "default_cooldown_secs")]
    pub campaign_cooldown_secs: u64,
    #[serde(default)]
    pub campaign_poll_secs: u64,
    #[serde(default = "default_upstream_timeout_secs")]
    pub upstream_timeout_secs: u64,

    pub otel_exporter_otlp_endpoint: Option<String>,
    #[serde(default = "default_service_name")]
    pub api_service_name: String,
    #[serde(default)]
    pub log_format: LogFormat,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    #[default]
    Pretty,
    Json,
}

impl Env {
    /// Reads the process environment, loading a `.env` file first if one is present.
    pub fn new() -> EnvResult<Self> {
        if let Err(e) = dotenvy::dotenv()
            && !e.not_found()
        {
            return Err(e.into());
        }

        Ok(from_iter(std::env::vars())?)
    }
}

fn default_port() -> u16 {
    constants::SERVER_PORT
}

fn default_database_path() -> String {
    String::from(constants::DATABASE_PATH)
}

fn default_cors() -> String {
    String::from("*")
}

fn default_site_url() -> String {
    String::from(constants::SITE_URL)
}

fn default_layers_dir() -> PathBuf {
    PathBuf::from(constants::LAYERS_DIR)
}

fn default_helius_rest_url() -> String {
    String::from(constants::HELIUS_REST_URL)
}

fn default_x_api_url() -> String {
    String::from(constants::X_API_URL)
}

fn default_hashtags() -> String {
    String::from(constants::DEFAULT_HASHTAGS)
}

fn default_total_cap() -> i64 {
    2
}

fn default_retweet_cap() -> i64 {
    3
}

fn default_cooldown_secs() -> u64 {
    60
}

fn default_upstream_timeout_secs() -> u64 {
    constants::UPSTREAM_TIMEOUT_SECS
}

fn default_service_name() -> String {
    String::from("retrograve-api")
}

// ---
//  Deserializer implementation
// ---

/// A single environment value, carrying its variable name for error messages.
struct Val(String, String);

/// An environment variable name used as a map key.
struct Key(String);

struct Vars<I> {
    inner: I,
}

impl<I: Iterator<Item = (String, String)>> Iterator for Vars<I> {
    type Item = (Key, Val);

    fn next(&mut self) -> Option<Self::Item> {
        self.inner
            .by_ref()
            .find(|(_, v)| !v.trim().is_empty())
            .map(|(k, v)| (Key(k.clone()), Val(k, v)))
    }
}

impl<'de> IntoDeserializer<'de, EnvDeserializeError> for Val {
    type Deserializer = Self;
    fn into_deserializer(self) -> Self::Deserializer {
        self
    }
}

impl<'de> IntoDeserializer<'de, EnvDeserializeError> for Key {
    type Deserializer = Self;
    fn into_deserializer(self) -> Self::Deserializer {
        self
    }
}

macro_rules! parse_scalar {
    ($($ty:ident => $method:ident,)*) => {
        $(
            fn $method<V>(self, visitor: V) -> Result<V::Value, EnvDeserializeError>
            where
                V: de::Visitor<'de>
            {
                match self.1.trim().parse::<$ty>() {
                    Ok(val) => val.into_deserializer().$method(visitor),
                    Err(e) => Err(de::Error::custom(format_args!(
                        "{e}: while parsing '{}' (from {})",
                        self.1, self.0
                    ))),
                }
            }
        )*
    };
}

impl<'de> de::Deserializer<'de> for Val {
    type Error = EnvDeserializeError;

    fn deserialize_any<V>(self, visitor: V) -> Result<V::Value, Self::Error>
    where
        V: de::Visitor<'de>,
    {
        self.1.into_deserializer().deserialize_any(visitor)
    }

    fn deserialize_seq<V>(self, visitor: V) -> Result<V::Value, Self::Error>
    where
        V: de::Visitor<'de>,
    {
        if self.1.is_empty() {
            return SeqDeserializer::new(empty::<Val>()).deserialize_seq(visitor);
        }

        let name = self.0;
        let values: Vec<Val> = self
            .1
            .split(',')
            .map(str::trim)
            .filter(|v| !v.is_empty())
            .map(|v| Val(name.clone(), v.to_owned()))
            .collect();

        SeqDeserializer::new(values.into_iter()).deserialize_seq(visitor)
    }

    fn deserialize_option<V>(self, visitor: V) -> Result<V::Value, Self::Error>
    where
        V: de::Visitor<'de>,
    {
        visitor.visit_some(self)
    }

    fn deserialize_newtype_struct<V>(
        self,
        _: &'static str,
        visitor: V,
    ) -> Result<V::Value, Self::Error>
    where
        V: de::Visitor<'de>,
    {
        visitor.visit_newtype_struct(self)
    }

    fn deserialize_enum<V>(
        self,
        _: &'static str,
        _: &'static [&'static str],
        visitor: V,
    ) -> Result<V::Value, Self::Error>
    where
        V: de::Visitor<'de>,
    {
        visitor.visit_enum(self.1.trim().to_lowercase().into_deserializer())
    }

    parse_scalar! {
        bool => deserialize_bool,
        u8 => deserialize_u8,
        u16 => deserialize_u16,
        u32 => deserialize_u32,
        u64 => deserialize_u64,
        i8 => deserialize_i8,
        i16 => deserialize_i16,
        i32 => deserialize_i32,
        i64 => deserialize_i64,
        f32 => deserialize_f32,
        f64 => deserialize_f64,
    }

    serde::forward_to_deserialize_any! {
        char str string unit bytes byte_buf map
        unit_struct tuple_struct identifier tuple
        ignored_any struct
    }
}

impl<'de> de::Deserializer<'de> for Key {
    type Error = EnvDeserializeError;

    fn deserialize_any<V>(self, visitor: V) -> Result<V::Value, Self::Error>
    where
        V: de::Visitor<'de>,
    {
        self.0.into_deserializer().deserialize_any(visitor)
    }

    serde::forward_to_deserialize_any! {
        char str string unit seq option bytes byte_buf map newtype_struct
        unit_struct tuple_struct identifier tuple ignored_any
        bool u8 u16 u32 u64 i8 i16 i32 i64 f32 f64 enum struct
    }
}

struct Deserializer<'de, I: Iterator<Item = (String, String)>> {
    inner: MapDeserializer<'de, Vars<I>, EnvDeserializeError>,
}

impl<'de, I: Iterator<Item = (String, String)>> de::Deserializer<'de> for Deserializer<'de, I> {
    type Error = EnvDeserializeError;

    fn deserialize_any<V>(self, visitor: V) -> Result<V::Value, Self::Error>
    where
        V: de::Visitor<'de>,
    {
        visitor.visit_map(self.inner)
    }

    serde::forward_to_deserialize_any! {
        char str string unit seq option bytes byte_buf map
        newtype_struct unit_struct tuple_struct identifier
        tuple ignored_any bool u8 u16 u32 u64 i8 i16 i32 i64
        f32 f64 enum struct
    }
}

/// Deserializes `T` from any iterator of `(name, value)` pairs.
pub fn from_iter<I, T>(iter: I) -> Result<T, EnvDeserializeError>
where
    T: de::DeserializeOwned,
    I: IntoIterator<Item = (String, String)>,
{
    T::deserialize(Deserializer {
        inner: MapDeserializer::new(Vars {
            inner: iter.into_iter(),
        }),
    })
}

pub type EnvResult<T> = core::result::Result<T, EnvErr>;

#[derive(Debug, Error)]
pub enum EnvErr {
    #[error(transparent)]
    Dotenvy(#[from] dotenvy::Error),

    #[error(transparent)]
    DeserializationError(#[from] EnvDeserializeError),
}

#[derive(Debug, Error)]
pub enum EnvDeserializeError {
    #[error("env deserialization error: {0}")]
    Custom(String),

    #[error("missing required variable {0}")]
    MissingValue(String),
}

impl de::Error for EnvDeserializeError {
    fn custom<T>(msg: T) -> Self
    where
        T: std::fmt::Display,
    {
        EnvDeserializeError::Custom(msg.to_string())
    }

    fn missing_field(field: &'static str) -> Self {
        EnvDeserializeError::MissingValue(field.into())
    }
}
