//! Remote request planning: case search queries and claim requests.
//!
//! # Architecture
//!
//! A module offering search gets one `remote-request` whose session runs the
//! search query and selects from the `results` instance, then claims the
//! chosen case into the local case database and rewinds to the caller.
//! Session endpoints get one claim-only request per selection they bind.
//! Inline search skips the remote request entirely; the query sits in the
//! entry session and the entry carries the claim `post`.

use suite_model::{
    CaseType, Command, CompileError, Datum, DatumKind, QueryData, QueryPrompt, QuerySpec,
    RegistryWorkflow, RemotePost, RemoteRequest, Result, SearchConfig, StackFrame, StackOp,
};

use crate::compile_context::CompileContext;
use crate::xpath;

pub const CASE_TYPE_KEY: &str = "case_type";
pub const CASE_ID_KEY: &str = "case_id";
pub const REGISTRY_KEY: &str = "commcare_registry";
pub const XPATH_QUERY_KEY: &str = "_xpath_query";
pub const BLACKLISTED_OWNER_IDS_KEY: &str = "commcare_blacklisted_owner_ids";
pub const CUSTOM_RELATED_CASE_PROPERTY_KEY: &str = "x_commcare_custom_related_case_property";
pub const SORT_KEY: &str = "commcare_sort";

const COMMCARE_PROJECT: &str = "commcare_project";

/// Case types a module searches for: its own type first, then any
/// additional types in declaration order.
pub fn search_case_types(ctx: &CompileContext<'_>, module: usize) -> Vec<CaseType> {
    let mut case_types: Vec<CaseType> = ctx.graph.case_type(module).into_iter().cloned().collect();
    if let Some(search) = ctx.graph.search(module) {
        for case_type in &search.additional_case_types {
            if !case_types.contains(case_type) {
                case_types.push(case_type.clone());
            }
        }
    }
    case_types
}

/// Search query of a module, stored into `storage_instance`.
pub fn search_query(ctx: &CompileContext<'_>, module: usize, storage_instance: &str) -> QuerySpec {
    let options = ctx.options;
    let search = ctx.graph.search(module);
    let default_search = search.is_some_and(|config| config.default_search);
    let mut data: Vec<QueryData> = search_case_types(ctx, module)
        .iter()
        .map(|case_type| QueryData::new(CASE_TYPE_KEY, quoted(case_type.as_str())))
        .collect();
    let mut prompts = Vec::new();
    if let Some(search) = search {
        data.extend(search_query_data(search));
        prompts = search
            .properties
            .iter()
            .map(|property| QueryPrompt {
                key: property.name.clone(),
                locale_id: format!("search_property.m{module}.{}", property.name),
                appearance: property.appearance.clone(),
                input: property.input.clone(),
                default_value: property.default_value.clone(),
            })
            .collect();
    }
    QuerySpec {
        url: format!("{}/phone/search/{}/", options.domain_url(), options.app_id),
        storage_instance: storage_instance.to_string(),
        template: Some("case".to_string()),
        default_search,
        data,
        prompts,
        case_datum: None,
    }
}

fn search_query_data(search: &SearchConfig) -> Vec<QueryData> {
    let mut data: Vec<QueryData> = search
        .default_properties
        .iter()
        .map(|property| QueryData::new(&property.property, &property.default_value))
        .collect();
    if let Some(filter) = &search.search_filter {
        data.push(QueryData::new(
            XPATH_QUERY_KEY,
            format!("'{}'", filter.replace('\'', "\"")),
        ));
    }
    if let Some(expression) = &search.blacklisted_owner_ids_expression {
        data.push(QueryData::new(BLACKLISTED_OWNER_IDS_KEY, expression));
    }
    if let Some(registry) = &search.data_registry {
        data.push(QueryData::new(REGISTRY_KEY, quoted(registry)));
    }
    if let Some(property) = &search.custom_related_case_property {
        data.push(QueryData::new(CUSTOM_RELATED_CASE_PROPERTY_KEY, quoted(property)));
    }
    if !search.sort_properties.is_empty() {
        let terms: Vec<String> = search
            .sort_properties
            .iter()
            .map(|sort| {
                let direction = if sort.descending { '-' } else { '+' };
                let sort_type = sort.sort_type.as_deref().unwrap_or("exact");
                format!("{direction}{}:{sort_type}", sort.property)
            })
            .collect();
        data.push(QueryData::new(SORT_KEY, quoted(&terms.join(","))));
    }
    data
}

/// Registry lookup that loads the selected case (and its relations) from a
/// data registry after selection.
pub fn registry_query(
    ctx: &CompileContext<'_>,
    case_types: &[CaseType],
    registry: &str,
    case_datum: &str,
) -> QuerySpec {
    let mut data: Vec<QueryData> = case_types
        .iter()
        .map(|case_type| QueryData::new(CASE_TYPE_KEY, quoted(case_type.as_str())))
        .collect();
    data.push(QueryData::new(CASE_ID_KEY, xpath::session_var(case_datum)));
    data.push(QueryData::new(REGISTRY_KEY, quoted(registry)));
    QuerySpec {
        url: format!(
            "{}/phone/registry_case/{}/",
            ctx.options.domain_url(),
            ctx.options.app_id
        ),
        storage_instance: xpath::REGISTRY_INSTANCE.to_string(),
        template: Some("case".to_string()),
        default_search: true,
        data,
        prompts: Vec::new(),
        case_datum: Some(case_datum.to_string()),
    }
}

fn quoted(value: &str) -> String {
    format!("'{value}'")
}

// ===== Remote requests =====

/// Whether a module gets its own search `remote-request`.
pub fn offers_remote_search(ctx: &CompileContext<'_>, module: usize) -> bool {
    ctx.graph
        .search(module)
        .is_some_and(|search| !search.inline_search)
}

/// Session variable a module's search binds the selected case to.
pub fn search_session_var(search: &SearchConfig) -> &str {
    if search.multi_select {
        xpath::SELECTED_CASES
    } else {
        &search.case_session_var
    }
}

/// Search and claim request of a module, if it offers remote search.
pub fn search_remote_request(ctx: &CompileContext<'_>, module: usize) -> Result<Option<RemoteRequest>> {
    let Some(search) = ctx.graph.search(module) else {
        return Ok(None);
    };
    if search.inline_search {
        return Ok(None);
    }
    let smart_link = uses_smart_links(ctx, module)?;
    let case_var = search_session_var(search);

    let mut post = claim_post(ctx, search, case_var);
    if smart_link {
        let relevant = post.relevant.take().unwrap_or_default();
        post.relevant = Some(format!("{relevant} and {}", same_domain_condition(case_var)));
    }

    let case_types = search_case_types(ctx, module);
    let type_refs: Vec<&CaseType> = case_types.iter().collect();
    let mut nodeset = xpath::results_nodeset(xpath::RESULTS_INSTANCE, &type_refs);
    if let Some(filter) = &search.search_filter {
        nodeset.push_str(&format!("[{filter}]"));
    }
    nodeset.push_str(xpath::RELATED_CASE_EXCLUSION);

    let mut datum = Datum::selection(case_var, nodeset, "./@case_id");
    datum.case_type = case_types.first().cloned();
    datum.detail_select = Some(xpath::detail(module, "search_short"));
    datum.autoselect = search.multi_select && search.auto_launch;
    if search.multi_select {
        datum.kind = DatumKind::InstanceSelection;
        datum.max_select_value = Some(search.max_select_value);
    } else {
        datum.detail_confirm = Some(xpath::detail(module, "search_long"));
    }

    let mut stack = Vec::with_capacity(2);
    let mut rewind_if = None;
    if smart_link {
        let same_domain = same_domain_condition(case_var);
        stack.push(
            StackFrame::push()
                .with_if(Some(format!("not({same_domain})")))
                .with_ops(vec![StackOp::Jump {
                    url: smart_link_url(ctx, module, case_var),
                }]),
        );
        rewind_if = Some(same_domain);
    }
    stack.push(
        StackFrame::push()
            .with_if(rewind_if)
            .with_ops(vec![StackOp::Rewind {
                value: xpath::session_var(case_var),
            }]),
    );

    Ok(Some(RemoteRequest {
        post,
        command: Command::new(
            xpath::search_command(module),
            format!("case_search.m{module}"),
        ),
        instances: Vec::new(),
        queries: vec![search_query(ctx, module, xpath::RESULTS_INSTANCE)],
        datums: vec![datum],
        stack,
    }))
}

/// Claim-only request an endpoint runs before navigating, one per bound
/// selection.
pub fn claim_remote_request(ctx: &CompileContext<'_>, endpoint_id: &str, datum_id: &str) -> RemoteRequest {
    let multi_select = datum_id == xpath::SELECTED_CASES;
    let relevant = if multi_select {
        xpath::selected_cases_not_claimed()
    } else {
        xpath::case_not_claimed(datum_id)
    };
    RemoteRequest {
        post: RemotePost {
            url: claim_url(ctx),
            relevant: Some(relevant),
            data: vec![claim_data(datum_id, multi_select)],
        },
        command: Command::new(xpath::claim_command(endpoint_id, datum_id), ""),
        instances: Vec::new(),
        queries: Vec::new(),
        datums: vec![Datum::computed(datum_id, xpath::session_var(datum_id))],
        stack: Vec::new(),
    }
}

/// Claim `post` of an entry whose case list searches inline.
pub fn inline_search_post(ctx: &CompileContext<'_>, module: usize) -> Option<RemotePost> {
    let search = ctx.graph.search(module).filter(|search| search.inline_search)?;
    Some(claim_post(ctx, search, search_session_var(search)))
}

fn claim_post(ctx: &CompileContext<'_>, search: &SearchConfig, case_var: &str) -> RemotePost {
    let relevant = if search.multi_select {
        xpath::selected_cases_not_claimed()
    } else {
        xpath::case_not_claimed(case_var)
    };
    RemotePost {
        url: claim_url(ctx),
        relevant: Some(relevant),
        data: vec![claim_data(case_var, search.multi_select)],
    }
}

fn claim_url(ctx: &CompileContext<'_>) -> String {
    format!("{}/phone/claim-case/", ctx.options.domain_url())
}

fn claim_data(case_var: &str, multi_select: bool) -> QueryData {
    if multi_select {
        let mut data = QueryData::new(CASE_ID_KEY, ".");
        data.nodeset = Some(format!("instance('{case_var}')/results/value"));
        data.exclude = Some(format!("{} = 1", xpath::count(&xpath::case_by_id("current()/."))));
        data
    } else {
        QueryData::new(CASE_ID_KEY, xpath::session_var(case_var))
    }
}

/// Smart links and registry case loading are mutually exclusive.
fn uses_smart_links(ctx: &CompileContext<'_>, module: usize) -> Result<bool> {
    let Some(search) = ctx.graph.search(module) else {
        return Ok(false);
    };
    let smart_link = search.uses_registry_workflow(RegistryWorkflow::SmartLink);
    if smart_link && search.uses_registry_workflow(RegistryWorkflow::LoadCase) {
        return Err(CompileError::suite_validation(
            Some(&ctx.graph.module(module).unique_id),
            None,
            "registry workflow conflict: load case and smart link cannot both be enabled",
        ));
    }
    Ok(smart_link)
}

fn case_domain(case_var: &str) -> String {
    format!(
        "instance('{}')/results/case[@case_id={}]/{COMMCARE_PROJECT}",
        xpath::RESULTS_INSTANCE,
        xpath::session_var(case_var)
    )
}

/// The selected case lives in the user's own project.
fn same_domain_condition(case_var: &str) -> String {
    format!(
        "{} = instance('commcaresession')/session/user/data/{COMMCARE_PROJECT}",
        case_domain(case_var)
    )
}

fn smart_link_url(ctx: &CompileContext<'_>, module: usize, case_var: &str) -> String {
    let endpoint = ctx
        .graph
        .module(module)
        .session_endpoint_id
        .as_deref()
        .unwrap_or_default();
    format!(
        "concat('{}/a/', {}, '/app/v1/{}/{endpoint}/', '?{case_var}=', {})",
        ctx.options.base_url.trim_end_matches('/'),
        case_domain(case_var),
        ctx.options.app_id,
        xpath::session_var(case_var)
    )
}
