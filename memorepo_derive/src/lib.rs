use proc_macro::TokenStream;
use proc_macro2::TokenStream as TokenStream2;
use quote::quote;
use syn::ext::IdentExt;
use syn::meta::ParseNestedMeta;
use syn::{
    Attribute, Data, DeriveInput, Fields, LitInt, LitStr, Path, Token, Type, parse_macro_input,
    spanned::Spanned,
};

/// Implements `memorepo::Entity` for a struct with named fields.
///
/// Field options: `#[entity(key)]`, `#[entity(not_mapped)]`.
/// Struct options: `#[entity(name = "...", table = "...", schema_version = N,
/// migration_plan = "path::to::fn")]`.
///
/// Column names follow serde: `#[serde(rename = "...")]` and
/// `#[serde(rename_all = "...")]` are honored, `#[serde(skip)]` fields are
/// not mapped, and `#[serde(flatten)]` is rejected.
#[proc_macro_derive(Entity, attributes(entity))]
pub fn derive_entity(input: TokenStream) -> TokenStream {
    let input = parse_macro_input!(input as DeriveInput);
    match expand_entity(input) {
        Ok(tokens) => tokens.into(),
        Err(err) => err.to_compile_error().into(),
    }
}

#[derive(Default)]
struct EntityOptions {
    type_name: Option<String>,
    table_name: Option<String>,
    schema_version: Option<u32>,
    migration_plan: Option<Path>,
}

#[derive(Default)]
struct FieldOptions {
    key: bool,
    not_mapped: bool,
}

/// The parts of `#[serde(...)]` that change how a struct lands in a row.
#[derive(Default)]
struct SerdeContainer {
    rename_all: Option<RenameRule>,
    default: bool,
}

#[derive(Default)]
struct SerdeField {
    rename: Option<String>,
    default: bool,
    skip: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum RenameRule {
    Lower,
    Upper,
    Pascal,
    Camel,
    Snake,
    ScreamingSnake,
    Kebab,
    ScreamingKebab,
}

impl RenameRule {
    fn parse(lit: &LitStr) -> syn::Result<Self> {
        Ok(match lit.value().as_str() {
            "lowercase" => Self::Lower,
            "UPPERCASE" => Self::Upper,
            "PascalCase" => Self::Pascal,
            "camelCase" => Self::Camel,
            "snake_case" => Self::Snake,
            "SCREAMING_SNAKE_CASE" => Self::ScreamingSnake,
            "kebab-case" => Self::Kebab,
            "SCREAMING-KEBAB-CASE" => Self::ScreamingKebab,
            other => {
                return Err(syn::Error::new(
                    lit.span(),
                    format!("Unknown serde rename rule '{other}'"),
                ));
            }
        })
    }

    /// Applies the rule to a snake_case field name, as serde does.
    fn apply(self, field: &str) -> String {
        match self {
            Self::Lower | Self::Snake => field.to_string(),
            Self::Upper | Self::ScreamingSnake => field.to_ascii_uppercase(),
            Self::Pascal => pascal_case(field),
            Self::Camel => {
                let pascal = pascal_case(field);
                let mut chars = pascal.chars();
                match chars.next() {
                    Some(first) => first.to_ascii_lowercase().to_string() + chars.as_str(),
                    None => pascal,
                }
            }
            Self::Kebab => field.replace('_', "-"),
            Self::ScreamingKebab => field.replace('_', "-").to_ascii_uppercase(),
        }
    }
}

fn pascal_case(field: &str) -> String {
    let mut out = String::with_capacity(field.len());
    let mut capitalize = true;
    for ch in field.chars() {
        if ch == '_' {
            capitalize = true;
        } else if capitalize {
            out.push(ch.to_ascii_uppercase());
            capitalize = false;
        } else {
            out.push(ch);
        }
    }
    out
}

fn expand_entity(input: DeriveInput) -> syn::Result<TokenStream2> {
    let struct_name = input.ident;
    let options = parse_entity_options(&input.attrs)?;
    let container = parse_serde_container(&input.attrs)?;

    let data_struct = match input.data {
        Data::Struct(data) => data,
        _ => {
            return Err(syn::Error::new(
                struct_name.span(),
                "Entity can only be derived for structs",
            ));
        }
    };

    let named_fields = match data_struct.fields {
        Fields::Named(fields) => fields,
        _ => {
            return Err(syn::Error::new(
                struct_name.span(),
                "Entity requires named fields",
            ));
        }
    };

    let mut descriptors = Vec::<TokenStream2>::new();
    let mut key_count = 0usize;
    for field in named_fields.named {
        let ident = field
            .ident
            .clone()
            .ok_or_else(|| syn::Error::new(field.span(), "Entity requires named fields"))?;
        let field_options = parse_field_options(&field.attrs)?;
        let serde_field = parse_serde_field(&field.attrs)?;
        let not_mapped = field_options.not_mapped || serde_field.skip;

        if field_options.key && not_mapped {
            return Err(syn::Error::new(
                field.span(),
                "A key field cannot be #[entity(not_mapped)] or #[serde(skip)]",
            ));
        }
        if not_mapped && !(serde_field.skip || serde_field.default || container.default)
            && !is_option(&field.ty)
        {
            return Err(syn::Error::new(
                field.span(),
                "#[entity(not_mapped)] fields are absent when loaded: use Option<_>, #[serde(default)] or #[serde(skip)]",
            ));
        }
        if field_options.key {
            key_count += 1;
            if key_count > 1 {
                return Err(syn::Error::new(
                    field.span(),
                    "Only one field can be marked #[entity(key)]",
                ));
            }
        }

        let name = match (serde_field.rename, container.rename_all) {
            (Some(rename), _) => rename,
            (None, Some(rule)) => rule.apply(&ident.unraw().to_string()),
            (None, None) => ident.unraw().to_string(),
        };
        let ty = field.ty;
        let mut descriptor = quote! {
            ::memorepo::FieldDescriptor::of::<#ty>(#name)
        };
        if field_options.key {
            descriptor = quote! { #descriptor.key() };
        }
        if not_mapped {
            descriptor = quote! { #descriptor.not_mapped() };
        }
        descriptors.push(descriptor);
    }

    let type_name = options
        .type_name
        .unwrap_or_else(|| struct_name.to_string());

    let table_name_fn = options.table_name.map(|table| {
        quote! {
            fn table_name() -> ::std::string::String {
                ::std::string::String::from(#table)
            }
        }
    });

    let schema_version_fn = options.schema_version.map(|version| {
        quote! {
            fn schema_version() -> u32 {
                #version
            }
        }
    });

    let migration_plan_fn = options.migration_plan.map(|path| {
        quote! {
            fn migration_plan() -> ::memorepo::MigrationPlan {
                #path()
            }
        }
    });

    let (impl_generics, ty_generics, where_clause) = input.generics.split_for_impl();

    Ok(quote! {
        impl #impl_generics ::memorepo::Entity for #struct_name #ty_generics #where_clause {
            fn type_name() -> &'static str {
                #type_name
            }

            fn fields() -> ::std::vec::Vec<::memorepo::FieldDescriptor> {
                ::std::vec![#(#descriptors),*]
            }

            #table_name_fn
            #schema_version_fn
            #migration_plan_fn
        }
    })
}

fn is_option(ty: &Type) -> bool {
    match ty {
        Type::Path(path) => path
            .path
            .segments
            .last()
            .is_some_and(|segment| segment.ident == "Option"),
        _ => false,
    }
}

fn parse_entity_options(attrs: &[Attribute]) -> syn::Result<EntityOptions> {
    let mut options = EntityOptions::default();

    for attr in attrs {
        if !attr.path().is_ident("entity") {
            continue;
        }

        attr.parse_nested_meta(|meta| {
            if meta.path.is_ident("name") {
                let lit: LitStr = meta.value()?.parse()?;
                options.type_name = Some(lit.value());
                return Ok(());
            }

            if meta.path.is_ident("table") {
                let lit: LitStr = meta.value()?.parse()?;
                options.table_name = Some(lit.value());
                return Ok(());
            }

            if meta.path.is_ident("schema_version") {
                let lit: LitInt = meta.value()?.parse()?;
                let version = lit.base10_parse::<u32>()?;
                if version == 0 {
                    return Err(meta.error("schema_version must be >= 1"));
                }
                options.schema_version = Some(version);
                return Ok(());
            }

            if meta.path.is_ident("migration_plan") {
                let lit: LitStr = meta.value()?.parse()?;
                options.migration_plan = Some(lit.parse()?);
                return Ok(());
            }

            Err(meta.error(
                "Unsupported entity attribute. Supported: name = \"...\", table = \"...\", schema_version = <u32>, migration_plan = \"path\"",
            ))
        })?;
    }

    Ok(options)
}

fn parse_field_options(attrs: &[Attribute]) -> syn::Result<FieldOptions> {
    let mut options = FieldOptions::default();

    for attr in attrs {
        if !attr.path().is_ident("entity") {
            continue;
        }

        attr.parse_nested_meta(|meta| {
            if meta.path.is_ident("key") {
                options.key = true;
                return Ok(());
            }

            if meta.path.is_ident("not_mapped") {
                options.not_mapped = true;
                return Ok(());
            }

            Err(meta.error(
                "Unsupported #[entity(...)] field option. Supported: key, not_mapped",
            ))
        })?;
    }

    Ok(options)
}

fn parse_serde_container(attrs: &[Attribute]) -> syn::Result<SerdeContainer> {
    let mut container = SerdeContainer::default();

    for attr in attrs {
        if !attr.path().is_ident("serde") {
            continue;
        }

        attr.parse_nested_meta(|meta| {
            if meta.path.is_ident("rename_all") {
                let lit = serialized_name(&meta)?;
                container.rename_all = Some(RenameRule::parse(&lit)?);
                return Ok(());
            }

            if meta.path.is_ident("default") {
                container.default = true;
                return skip_meta_value(&meta);
            }

            skip_meta_value(&meta)
        })?;
    }

    Ok(container)
}

fn parse_serde_field(attrs: &[Attribute]) -> syn::Result<SerdeField> {
    let mut field = SerdeField::default();

    for attr in attrs {
        if !attr.path().is_ident("serde") {
            continue;
        }

        attr.parse_nested_meta(|meta| {
            if meta.path.is_ident("rename") {
                field.rename = Some(serialized_name(&meta)?.value());
                return Ok(());
            }

            if meta.path.is_ident("default") {
                field.default = true;
                return skip_meta_value(&meta);
            }

            if meta.path.is_ident("skip") {
                field.skip = true;
                return Ok(());
            }

            if meta.path.is_ident("flatten") {
                return Err(meta.error("#[serde(flatten)] is not supported on entity fields"));
            }

            skip_meta_value(&meta)
        })?;
    }

    Ok(field)
}

/// Reads `name = "..."` or `name(serialize = "...", deserialize = "...")`.
///
/// Rows are written and read back under one name, so the two directions
/// must agree.
fn serialized_name(meta: &ParseNestedMeta) -> syn::Result<LitStr> {
    if meta.input.peek(Token![=]) {
        return meta.value()?.parse();
    }

    let mut serialize: Option<LitStr> = None;
    let mut deserialize: Option<LitStr> = None;
    meta.parse_nested_meta(|nested| {
        if nested.path.is_ident("serialize") {
            serialize = Some(nested.value()?.parse()?);
            return Ok(());
        }
        if nested.path.is_ident("deserialize") {
            deserialize = Some(nested.value()?.parse()?);
            return Ok(());
        }
        Err(nested.error("Expected serialize = \"...\" or deserialize = \"...\""))
    })?;

    match (serialize, deserialize) {
        (Some(ser), Some(de)) if ser.value() != de.value() => Err(syn::Error::new(
            de.span(),
            "Entity columns need the same serialize and deserialize name",
        )),
        (Some(ser), _) => Ok(ser),
        _ => Err(meta.error("Entity columns need a serialize name")),
    }
}

/// Consumes the value of a serde option this derive does not interpret.
fn skip_meta_value(meta: &ParseNestedMeta) -> syn::Result<()> {
    if meta.input.peek(Token![=]) {
        let _: syn::Expr = meta.value()?.parse()?;
    } else if meta.input.peek(syn::token::Paren) {
        meta.parse_nested_meta(|nested| skip_meta_value(&nested))?;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use syn::parse_quote;

    fn expand(input: DeriveInput) -> syn::Result<String> {
        expand_entity(input).map(|tokens| tokens.to_string())
    }

    #[test]
    fn test_rename_rules() {
        assert_eq!(RenameRule::Pascal.apply("order_id"), "OrderId");
        assert_eq!(RenameRule::Camel.apply("order_id"), "orderId");
        assert_eq!(RenameRule::ScreamingSnake.apply("order_id"), "ORDER_ID");
        assert_eq!(RenameRule::Kebab.apply("order_id"), "order-id");
        assert_eq!(RenameRule::ScreamingKebab.apply("order_id"), "ORDER-ID");
        assert_eq!(RenameRule::Lower.apply("id"), "id");
    }

    #[test]
    fn test_rename_all_sets_column_names() {
        let tokens = expand(parse_quote! {
            #[serde(rename_all = "PascalCase", deny_unknown_fields)]
            struct Person {
                id: i32,
                #[serde(rename = "FullName", alias = "name")]
                name: String,
            }
        })
        .unwrap();
        assert!(tokens.contains("\"Id\""));
        assert!(tokens.contains("\"FullName\""));
        assert!(!tokens.contains("\"name\""));
    }

    #[test]
    fn test_serde_skip_is_not_mapped() {
        let tokens = expand(parse_quote! {
            struct Account {
                id: i32,
                #[serde(skip)]
                cache: String,
            }
        })
        .unwrap();
        assert!(tokens.contains("not_mapped"));
    }

    #[test]
    fn test_not_mapped_field_must_be_loadable() {
        let err = expand(parse_quote! {
            struct Account {
                id: i32,
                #[entity(not_mapped)]
                cache: String,
            }
        })
        .unwrap_err();
        assert!(err.to_string().contains("not_mapped"));

        for input in [
            parse_quote! {
                struct Account { id: i32, #[entity(not_mapped)] cache: Option<String> }
            },
            parse_quote! {
                struct Account { id: i32, #[entity(not_mapped)] #[serde(default)] cache: String }
            },
            parse_quote! {
                #[serde(default)]
                struct Account { id: i32, #[entity(not_mapped)] cache: String }
            },
        ] {
            assert!(expand(input).is_ok());
        }
    }

    #[test]
    fn test_unsupported_serde_shapes_are_rejected() {
        assert!(
            expand(parse_quote! {
                struct Order { id: i32, #[serde(flatten)] extra: Extra }
            })
            .is_err()
        );
        assert!(
            expand(parse_quote! {
                struct Order {
                    #[serde(rename(serialize = "Id", deserialize = "id"))]
                    id: i32,
                }
            })
            .is_err()
        );
        assert!(
            expand(parse_quote! {
                #[serde(rename_all = "Title Case")]
                struct Order { id: i32 }
            })
            .is_err()
        );
    }
}
