use common::PackageType;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::Value;

macro_rules! metadata_kinds {
    ($($variant:ident),+ $(,)?) => {
        /// Ecosystem metadata of a version.
        ///
        /// The variant follows the package type; the payload is whatever the
        /// ecosystem adapter stored and is never inspected here.
        #[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
        #[serde(tag = "type", content = "metadata", rename_all = "lowercase")]
        pub enum Metadata {
            $($variant(Value),)+
        }

        impl Metadata {
            pub fn new(package_type: PackageType, payload: Value) -> Self {
                match package_type {
                    $(PackageType::$variant => Self::$variant(payload),)+
                }
            }

            pub fn package_type(&self) -> PackageType {
                match self {
                    $(Self::$variant(_) => PackageType::$variant,)+
                }
            }

            pub fn payload(&self) -> &Value {
                match self {
                    $(Self::$variant(v) => v,)+
                }
            }

            pub fn into_payload(self) -> Value {
                match self {
                    $(Self::$variant(v) => v,)+
                }
            }
        }
    };
}

metadata_kinds!(
    Alpine, Cargo, Chef, Composer, Conan, Conda, Container, Debian, Generic, Go, Helm, Maven,
    Npm, NuGet, Pub, PyPi, Rpm, RubyGems, Swift, Vagrant,
);

impl Metadata {
    /// Decode a stored `metadata_json` column. An empty column decodes to `null`.
    pub fn decode(package_type: PackageType, json: &str) -> Result<Self, serde_json::Error> {
        let payload = if json.trim().is_empty() {
            Value::Null
        } else {
            serde_json::from_str(json)?
        };
        Ok(Self::new(package_type, payload))
    }

    /// Encode the payload for the `metadata_json` column.
    pub fn encode(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string(self.payload())
    }

    /// Deserialize the payload into the ecosystem's own metadata type.
    pub fn parse<T: DeserializeOwned>(&self) -> Result<T, serde_json::Error> {
        T::deserialize(self.payload())
    }
}
