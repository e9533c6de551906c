//! Serialized declaration graph consumed by [`ModelHost`](super::ModelHost).
//!
//! A model is a JSON document:
//!
//! ```json
//! {
//!   "settings": { "always_emit_index": false },
//!   "assembly_attributes": [{ "name": "GenerateUnityConstants", "args": [{ "value": "Game" }] }],
//!   "types": [
//!     {
//!       "name": "Game.Enemy",
//!       "kind": "class",
//!       "base": "UnityEngine.MonoBehaviour",
//!       "attributes": [{ "name": "Track" }],
//!       "methods": [
//!         { "name": "Init", "attributes": [{ "name": "Inject" }], "body": ["Body = GetComponent<Rigidbody>()"] }
//!       ]
//!     }
//!   ]
//! }
//! ```
//!
//! Every type reference is parsed when the model is loaded, so a malformed type string is a load error
//! rather than a silent lookup miss later.

use derivgen_syntax::{RefKind, TypeSyntax};
use serde::{Deserialize, Serialize};

use crate::settings::GeneratorSettings;

/// A type reference as written in the model or produced by the binder.
///
/// Canonical (resolved) references carry the fully qualified definition name; type parameters keep their
/// bare name (`T`).
pub type TypeRef = TypeSyntax;

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Model {
    #[serde(default)]
    pub settings: GeneratorSettings,
    #[serde(default)]
    pub assembly_attributes: Vec<AttributeData>,
    #[serde(default)]
    pub types: Vec<TypeDecl>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TypeKind {
    Class,
    Struct,
    Interface,
    Enum,
}

/// Declared accessibility, ordered from most to least restrictive.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Accessibility {
    Private,
    Protected,
    #[default]
    Internal,
    ProtectedInternal,
    Public,
}

impl Accessibility {
    pub fn keyword(self) -> &'static str {
        match self {
            Accessibility::Private => "private",
            Accessibility::Protected => "protected",
            Accessibility::Internal => "internal",
            Accessibility::ProtectedInternal => "protected internal",
            Accessibility::Public => "public",
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TypeDecl {
    /// Fully qualified name without generic arity: `Game.Pool`.
    pub name: String,
    pub kind: TypeKind,
    #[serde(default)]
    pub type_params: Vec<String>,
    #[serde(default)]
    pub accessibility: Accessibility,
    /// Qualified name of the containing type for nested declarations.
    #[serde(default)]
    pub containing: Option<String>,
    #[serde(default, with = "type_text::opt")]
    pub base: Option<TypeRef>,
    #[serde(default, with = "type_text::list")]
    pub interfaces: Vec<TypeRef>,
    #[serde(default)]
    pub attributes: Vec<AttributeData>,
    #[serde(default)]
    pub fields: Vec<FieldDecl>,
    #[serde(default)]
    pub properties: Vec<PropertyDecl>,
    #[serde(default)]
    pub methods: Vec<MethodDecl>,
    #[serde(default)]
    pub is_static: bool,
    #[serde(default)]
    pub is_sealed: bool,
    #[serde(default)]
    pub is_abstract: bool,
    /// Declared outside the compilation; visible to lookups but never generated for.
    #[serde(default)]
    pub external: bool,
    /// Source file, for diagnostics.
    #[serde(default)]
    pub file: Option<String>,
}

impl TypeDecl {
    /// Last segment of the qualified name.
    pub fn simple_name(&self) -> &str {
        self.name.rsplit('.').next().unwrap_or(&self.name)
    }

    pub fn is_value_type(&self) -> bool {
        matches!(self.kind, TypeKind::Struct | TypeKind::Enum)
    }

    pub fn has_attribute(&self, marker: derivgen_core::MarkerId) -> bool {
        self.attributes.iter().any(|a| a.marker() == Some(marker))
    }

    pub fn attribute(&self, marker: derivgen_core::MarkerId) -> Option<&AttributeData> {
        self.attributes.iter().find(|a| a.marker() == Some(marker))
    }

    /// Names of every member declared directly on this type.
    pub fn member_names(&self) -> impl Iterator<Item = &str> {
        self.fields
            .iter()
            .map(|f| f.name.as_str())
            .chain(self.properties.iter().map(|p| p.name.as_str()))
            .chain(self.methods.iter().map(|m| m.name.as_str()))
    }

    pub fn declares_member(&self, name: &str) -> bool {
        self.member_names().any(|n| n == name)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct AttributeData {
    pub name: String,
    #[serde(default)]
    pub args: Vec<AttributeArg>,
}

impl AttributeData {
    pub fn marker(&self) -> Option<derivgen_core::MarkerId> {
        derivgen_core::vocab::markers::from_attribute_name(&self.name)
    }
}

/// One constructor or named argument. Positional arguments have no name.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct AttributeArg {
    #[serde(default)]
    pub name: Option<String>,
    pub value: AttributeValue,
}

#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(untagged)]
pub enum AttributeValue {
    Bool(bool),
    Int(i64),
    /// Strings, enum member names (`SingletonStrategy.KeepExisting`) and `typeof(...)` operands.
    Text(String),
    List(Vec<AttributeValue>),
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FieldDecl {
    pub name: String,
    #[serde(rename = "type", with = "type_text")]
    pub ty: TypeRef,
    #[serde(default)]
    pub accessibility: Accessibility,
    #[serde(default)]
    pub is_static: bool,
    #[serde(default)]
    pub is_const: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PropertyDecl {
    pub name: String,
    #[serde(rename = "type", with = "type_text")]
    pub ty: TypeRef,
    #[serde(default)]
    pub accessibility: Accessibility,
    #[serde(default)]
    pub is_static: bool,
    /// Interface properties with a default body are not dispatched.
    #[serde(default)]
    pub has_body: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ParamModifier {
    #[default]
    None,
    Ref,
    Out,
    In,
}

impl From<ParamModifier> for RefKind {
    fn from(m: ParamModifier) -> Self {
        match m {
            ParamModifier::None => RefKind::Value,
            ParamModifier::Ref => RefKind::Ref,
            ParamModifier::Out => RefKind::Out,
            ParamModifier::In => RefKind::In,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ParamDecl {
    pub name: String,
    #[serde(rename = "type", with = "type_text")]
    pub ty: TypeRef,
    #[serde(default)]
    pub modifier: ParamModifier,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MethodDecl {
    pub name: String,
    #[serde(default)]
    pub type_params: Vec<String>,
    #[serde(default)]
    pub params: Vec<ParamDecl>,
    #[serde(default = "void_type", with = "type_text")]
    pub returns: TypeRef,
    #[serde(default)]
    pub accessibility: Accessibility,
    #[serde(default)]
    pub is_static: bool,
    /// First parameter is the `this` receiver.
    #[serde(default)]
    pub is_extension: bool,
    #[serde(default)]
    pub attributes: Vec<AttributeData>,
    #[serde(default)]
    pub body: Vec<BodyStatement>,
}

impl MethodDecl {
    pub fn has_attribute(&self, marker: derivgen_core::MarkerId) -> bool {
        self.attributes.iter().any(|a| a.marker() == Some(marker))
    }

    pub fn attribute(&self, marker: derivgen_core::MarkerId) -> Option<&AttributeData> {
        self.attributes.iter().find(|a| a.marker() == Some(marker))
    }
}

fn void_type() -> TypeRef {
    TypeRef::named("void")
}

/// A statement in a method body, optionally annotated with the type the host compiler already bound for
/// its value.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum BodyStatement {
    Text(String),
    Annotated {
        text: String,
        #[serde(rename = "type", with = "type_text")]
        ty: TypeRef,
    },
}

impl BodyStatement {
    pub fn text(&self) -> &str {
        match self {
            BodyStatement::Text(text) | BodyStatement::Annotated { text, .. } => text,
        }
    }

    pub fn annotation(&self) -> Option<&TypeRef> {
        match self {
            BodyStatement::Text(_) => None,
            BodyStatement::Annotated { ty, .. } => Some(ty),
        }
    }
}

/// Serde adapters that store [`TypeRef`]s as C# type text.
pub(crate) mod type_text {
    use derivgen_syntax::parser::parse_type;
    use serde::{Deserialize, Deserializer, Serializer};

    use super::TypeRef;

    pub fn serialize<S: Serializer>(ty: &TypeRef, s: S) -> Result<S::Ok, S::Error> {
        s.collect_str(ty)
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(d: D) -> Result<TypeRef, D::Error> {
        let text = String::deserialize(d)?;
        parse_type(&text).map_err(|e| serde::de::Error::custom(format!("invalid type `{text}`: {e}")))
    }

    pub mod opt {
        use super::*;

        pub fn serialize<S: Serializer>(ty: &Option<TypeRef>, s: S) -> Result<S::Ok, S::Error> {
            match ty {
                Some(ty) => s.collect_str(ty),
                None => s.serialize_none(),
            }
        }

        pub fn deserialize<'de, D: Deserializer<'de>>(d: D) -> Result<Option<TypeRef>, D::Error> {
            Option::<String>::deserialize(d)?
                .map(|text| {
                    parse_type(&text).map_err(|e| serde::de::Error::custom(format!("invalid type `{text}`: {e}")))
                })
                .transpose()
        }
    }

    pub mod list {
        use super::*;
        use serde::ser::SerializeSeq;

        pub fn serialize<S: Serializer>(tys: &[TypeRef], s: S) -> Result<S::Ok, S::Error> {
            let mut seq = s.serialize_seq(Some(tys.len()))?;
            for ty in tys {
                seq.serialize_element(&ty.to_string())?;
            }
            seq.end()
        }

        pub fn deserialize<'de, D: Deserializer<'de>>(d: D) -> Result<Vec<TypeRef>, D::Error> {
            Vec::<String>::deserialize(d)?
                .into_iter()
                .map(|text| {
                    parse_type(&text).map_err(|e| serde::de::Error::custom(format!("invalid type `{text}`: {e}")))
                })
                .collect()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_type_strings_are_parsed_on_load() {
        let decl: TypeDecl = serde_json::from_str(
            r#"{ "name": "Game.Enemy", "kind": "class", "interfaces": ["Medicine.IUnmanagedData<Game.Stats>"] }"#,
        )
        .unwrap();
        assert_eq!(decl.interfaces[0].name, "Medicine.IUnmanagedData");
        assert_eq!(decl.interfaces[0].args[0].name, "Game.Stats");
        assert_eq!(decl.accessibility, Accessibility::Internal);
    }

    #[test]
    fn test_malformed_type_is_a_load_error() {
        let err = serde_json::from_str::<TypeDecl>(r#"{ "name": "A", "kind": "class", "base": "Foo<" }"#).unwrap_err();
        assert!(err.to_string().contains("invalid type `Foo<`"));
    }

    #[test]
    fn test_body_statements_accept_annotations() {
        let m: MethodDecl = serde_json::from_str(
            r#"{ "name": "Init", "body": ["A = 1", { "text": "B = Make()", "type": "Game.Thing" }] }"#,
        )
        .unwrap();
        assert_eq!(m.body[0].annotation(), None);
        assert_eq!(m.body[1].annotation().map(|t| t.name.as_str()), Some("Game.Thing"));
        assert_eq!(m.returns.name, "void");
    }
}
