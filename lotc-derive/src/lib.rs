use proc_macro::TokenStream;
use quote::quote;
use syn::{parse_macro_input, Attribute, Data, DeriveInput, Fields, Lit, Meta};

/// Derive macro that describes the CSV columns of an input row struct.
///
/// Columns come from named fields in declaration order:
/// - Column name respects `#[serde(rename = "...")]`
/// - Fields marked `#[serde(skip)]` are not columns
/// - `#[csv(required)]` marks a column that must be present for every row kind
/// - Description is taken from doc comments
///
/// Generates `csv_schema() -> &'static [CsvField]` and `csv_header() -> String`.
/// A `CsvField` struct with `name`, `required` and `description` must be in scope.
#[proc_macro_derive(CsvSchema, attributes(csv))]
pub fn derive_csv_schema(input: TokenStream) -> TokenStream {
    let input = parse_macro_input!(input as DeriveInput);
    let name = &input.ident;

    let fields = match &input.data {
        Data::Struct(data) => match &data.fields {
            Fields::Named(fields) => &fields.named,
            _ => {
                return syn::Error::new_spanned(name, "CsvSchema only supports named fields")
                    .to_compile_error()
                    .into()
            }
        },
        _ => {
            return syn::Error::new_spanned(name, "CsvSchema only supports structs")
                .to_compile_error()
                .into()
        }
    };

    let columns: Vec<_> = fields
        .iter()
        .filter(|field| !has_serde_flag(&field.attrs, "skip"))
        .filter_map(|field| {
            let ident = field.ident.as_ref()?.to_string();
            let column = serde_rename(&field.attrs).unwrap_or(ident);
            let required = has_csv_flag(&field.attrs, "required");
            let doc = doc_comment(&field.attrs);
            Some((column, required, doc))
        })
        .collect();

    let entries = columns.iter().map(|(column, required, doc)| {
        quote! {
            CsvField {
                name: #column,
                required: #required,
                description: #doc,
            }
        }
    });
    let header = columns
        .iter()
        .map(|(column, _, _)| column.as_str())
        .collect::<Vec<_>>()
        .join(",");

    let expanded = quote! {
        impl #name {
            pub fn csv_schema() -> &'static [CsvField] {
                static SCHEMA: &[CsvField] = &[
                    #(#entries),*
                ];
                SCHEMA
            }

            pub fn csv_header() -> String {
                #header.to_string()
            }
        }
    };

    TokenStream::from(expanded)
}

fn serde_rename(attrs: &[Attribute]) -> Option<String> {
    let mut rename = None;
    for attr in attrs.iter().filter(|a| a.path().is_ident("serde")) {
        let _ = attr.parse_nested_meta(|meta| {
            if meta.path.is_ident("rename") {
                if let Lit::Str(s) = meta.value()?.parse::<Lit>()? {
                    rename = Some(s.value());
                }
            } else if meta.input.peek(syn::Token![=]) {
                // consume values of other keys such as `default = "..."`
                let _: Lit = meta.value()?.parse()?;
            }
            Ok(())
        });
    }
    rename
}

fn has_serde_flag(attrs: &[Attribute], flag: &str) -> bool {
    has_flag(attrs, "serde", flag)
}

fn has_csv_flag(attrs: &[Attribute], flag: &str) -> bool {
    has_flag(attrs, "csv", flag)
}

fn has_flag(attrs: &[Attribute], attr_name: &str, flag: &str) -> bool {
    let mut found = false;
    for attr in attrs.iter().filter(|a| a.path().is_ident(attr_name)) {
        let _ = attr.parse_nested_meta(|meta| {
            if meta.path.is_ident(flag) {
                found = true;
            } else if meta.input.peek(syn::Token![=]) {
                let _: Lit = meta.value()?.parse()?;
            }
            Ok(())
        });
    }
    found
}

fn doc_comment(attrs: &[Attribute]) -> String {
    attrs
        .iter()
        .filter_map(|attr| {
            if !attr.path().is_ident("doc") {
                return None;
            }
            if let Meta::NameValue(meta) = &attr.meta {
                if let syn::Expr::Lit(expr_lit) = &meta.value {
                    if let Lit::Str(lit_str) = &expr_lit.lit {
                        return Some(lit_str.value().trim().to_string());
                    }
                }
            }
            None
        })
        .collect::<Vec<_>>()
        .join(" ")
}
