extern crate proc_macro;

use proc_macro::TokenStream;
use proc_macro2::TokenStream as TokenStream2;
use quote::quote;
use syn::{parse_macro_input, FnArg, ImplItem, ItemImpl, LitStr, Pat, PatType, Type};

/// Turns an `impl` block with an `async fn execute(&self, params: P)` into a
/// registered tool.
///
/// ```ignore
/// #[tool(name = "add", description = "Adds two integers")]
/// impl AddTool {
///     async fn execute(&self, params: AddParams) -> ToolResult { ... }
/// }
/// ```
#[proc_macro_attribute]
pub fn tool(args: TokenStream, input: TokenStream) -> TokenStream {
    let input = parse_macro_input!(input as ItemImpl);

    let mut name: Option<LitStr> = None;
    let mut description: Option<LitStr> = None;
    let parser = syn::meta::parser(|meta| {
        if meta.path.is_ident("name") {
            name = Some(meta.value()?.parse()?);
            Ok(())
        } else if meta.path.is_ident("description") {
            description = Some(meta.value()?.parse()?);
            Ok(())
        } else {
            Err(meta.error("unsupported tool attribute, expected `name` or `description`"))
        }
    });
    parse_macro_input!(args with parser);

    match tool_impl(name, description, input) {
        Ok(tokens) => tokens.into(),
        Err(err) => err.to_compile_error().into(),
    }
}

fn tool_impl(name: Option<LitStr>, description: Option<LitStr>, input: ItemImpl) -> syn::Result<TokenStream2> {
    let name = name.ok_or_else(|| syn::Error::new_spanned(&input.self_ty, "Missing required 'name' attribute"))?;
    let description = description
        .ok_or_else(|| syn::Error::new_spanned(&input.self_ty, "Missing required 'description' attribute"))?;

    if name.value().is_empty() {
        return Err(syn::Error::new_spanned(&name, "tool name cannot be empty"));
    }

    // Use CARGO_PKG_NAME to detect if we're inside confab-core or external
    let pkg_name = std::env::var("CARGO_PKG_NAME").unwrap_or_default();
    let crate_name = if pkg_name == "confab-core" || pkg_name == "confab_core" {
        quote! { crate }
    } else {
        quote! { ::confab_core }
    };

    let self_ty = &input.self_ty;
    let param_type = execute_param_type(&input)?;

    let expanded = quote! {
        #input

        impl ::confab_llm::ToolDescription for #self_ty {
            fn name(&self) -> &'static str {
                #name
            }

            fn description(&self) -> &'static str {
                #description
            }

            fn parameters_schema(&self) -> ::serde_json::Value {
                ::confab_llm::parameters_schema_for::<#param_type>()
            }
        }

        #[::async_trait::async_trait]
        impl #crate_name::tools::Tool for #self_ty {
            type Params = #param_type;

            async fn execute(&self, params: Self::Params) -> #crate_name::tools::ToolResult {
                <Self>::execute(self, params).await
            }
        }
    };

    Ok(expanded)
}

/// Type of the `params` argument of the `execute` method
fn execute_param_type(input: &ItemImpl) -> syn::Result<&Type> {
    let execute = input
        .items
        .iter()
        .find_map(|item| match item {
            ImplItem::Fn(method) if method.sig.ident == "execute" => Some(method),
            _ => None,
        })
        .ok_or_else(|| syn::Error::new_spanned(&input.self_ty, "Expected an 'execute' method"))?;

    if execute.sig.asyncness.is_none() {
        return Err(syn::Error::new_spanned(&execute.sig, "'execute' must be async"));
    }

    execute
        .sig
        .inputs
        .iter()
        .find_map(|arg| match arg {
            FnArg::Typed(PatType { pat, ty, .. }) => match pat.as_ref() {
                Pat::Ident(ident) if ident.ident == "params" => Some(ty.as_ref()),
                _ => None,
            },
            FnArg::Receiver(_) => None,
        })
        .ok_or_else(|| syn::Error::new_spanned(&execute.sig, "Expected 'execute' method to have a 'params' parameter"))
}
