//! Suite XML output generation.

use std::fs::{self, File};
use std::io::{BufWriter, Write};
use std::path::Path;

use anyhow::{Context, Result};
use quick_xml::Writer;
use quick_xml::events::{BytesDecl, BytesStart, BytesText, Event};

use suite_model::{
    Assertion, Command, Datum, DatumKind, Endpoint, Entry, Instance, Menu, QueryData, QuerySpec,
    RemotePost, RemoteRequest, ScheduleFixture, StackFrame, StackOp, Suite, XformResource,
};

use crate::common::{
    element, fixture_bool, write_empty, write_end, write_locale_text, write_start,
    write_text_element, xml_bool,
};

/// Write `suite` as indented XML to `output_path`, creating parent
/// directories as needed.
pub fn write_suite_xml_file(output_path: &Path, suite: &Suite) -> Result<()> {
    if let Some(parent) = output_path.parent()
        && !parent.as_os_str().is_empty()
    {
        fs::create_dir_all(parent).with_context(|| format!("create {}", parent.display()))?;
    }
    let file = File::create(output_path).with_context(|| format!("create {}", output_path.display()))?;
    let mut writer = BufWriter::new(file);
    write_suite_xml(&mut writer, suite)?;
    writer
        .flush()
        .with_context(|| format!("flush {}", output_path.display()))?;
    Ok(())
}

/// Render `suite` to a string.
pub fn suite_xml_string(suite: &Suite) -> Result<String> {
    let mut buffer = Vec::new();
    write_suite_xml(&mut buffer, suite)?;
    String::from_utf8(buffer).context("suite xml is not utf-8")
}

/// Write `suite` as XML. Elements appear as xform resources, fixtures,
/// entries, menus, remote requests, then endpoints.
pub fn write_suite_xml<W: Write>(output: W, suite: &Suite) -> Result<()> {
    let mut xml = Writer::new_with_indent(output, b' ', 2);
    xml.write_event(Event::Decl(BytesDecl::new("1.0", Some("UTF-8"), None)))?;

    write_start(&mut xml, element("suite", &[("version", Some(suite.version.as_str()))]))?;
    for resource in &suite.xforms {
        write_xform(&mut xml, resource)?;
    }
    for fixture in &suite.fixtures {
        write_fixture(&mut xml, fixture)?;
    }
    for entry in &suite.entries {
        write_entry(&mut xml, entry)?;
    }
    for menu in &suite.menus {
        write_menu(&mut xml, menu)?;
    }
    for request in &suite.remote_requests {
        write_remote_request(&mut xml, request)?;
    }
    for endpoint in &suite.endpoints {
        write_endpoint(&mut xml, endpoint)?;
    }
    write_end(&mut xml, "suite")?;
    xml.get_mut().flush().context("flush suite xml")?;
    Ok(())
}

// ============================================================================
// Top-level elements
// ============================================================================

fn write_xform<W: Write>(xml: &mut Writer<W>, resource: &XformResource) -> Result<()> {
    write_start(xml, BytesStart::new("xform"))?;
    write_start(
        xml,
        element(
            "resource",
            &[
                ("id", Some(resource.id.as_str())),
                ("descriptor", Some(resource.descriptor.as_str())),
            ],
        ),
    )?;
    write_start(xml, element("location", &[("authority", Some("local"))]))?;
    xml.write_event(Event::Text(BytesText::new(&resource.path)))?;
    write_end(xml, "location")?;
    write_end(xml, "resource")?;
    write_end(xml, "xform")
}

fn write_fixture<W: Write>(xml: &mut Writer<W>, fixture: &ScheduleFixture) -> Result<()> {
    write_start(xml, element("fixture", &[("id", Some(fixture.id.as_str()))]))?;
    let starts = fixture.starts.map(|value| value.to_string());
    let expires = fixture.expires.map(|value| value.to_string()).unwrap_or_default();
    write_start(
        xml,
        element(
            "schedule",
            &[
                ("starts", starts.as_deref()),
                ("expires", Some(expires.as_str())),
                ("allow_unscheduled", Some(fixture_bool(fixture.allow_unscheduled))),
            ],
        ),
    )?;
    for visit in &fixture.visits {
        let id = visit.id.to_string();
        let due = visit.due.to_string();
        let starts = visit.starts.map(|value| value.to_string());
        let expires = visit.expires.map(|value| value.to_string());
        let increment = visit.increment.map(|value| value.to_string());
        write_empty(
            xml,
            element(
                "visit",
                &[
                    ("id", Some(id.as_str())),
                    ("due", Some(due.as_str())),
                    ("starts", starts.as_deref()),
                    ("expires", expires.as_deref()),
                    ("repeats", Some(fixture_bool(visit.repeats))),
                    ("increment", increment.as_deref()),
                ],
            ),
        )?;
    }
    write_end(xml, "schedule")?;
    write_end(xml, "fixture")
}

fn write_entry<W: Write>(xml: &mut Writer<W>, entry: &Entry) -> Result<()> {
    write_start(xml, BytesStart::new("entry"))?;
    if let Some(form) = &entry.form {
        write_text_element(xml, "form", form)?;
    }
    if let Some(post) = &entry.post {
        write_post(xml, post)?;
    }
    write_command(xml, &entry.command)?;
    write_instances(xml, &entry.instances)?;
    if !entry.datums.is_empty() {
        write_start(xml, BytesStart::new("session"))?;
        for datum in &entry.datums {
            write_datum(xml, datum)?;
        }
        write_end(xml, "session")?;
    }
    write_assertions(xml, &entry.assertions)?;
    write_stack(xml, &entry.stack)?;
    write_end(xml, "entry")
}

fn write_menu<W: Write>(xml: &mut Writer<W>, menu: &Menu) -> Result<()> {
    write_start(
        xml,
        element(
            "menu",
            &[
                ("id", Some(menu.id.as_str())),
                ("root", menu.root.as_deref()),
                ("relevant", menu.relevant.as_deref()),
            ],
        ),
    )?;
    write_locale_text(xml, &menu.locale_id, &[])?;
    for command in &menu.commands {
        write_empty(
            xml,
            element(
                "command",
                &[
                    ("id", Some(command.id.as_str())),
                    ("relevant", command.relevant.as_deref()),
                ],
            ),
        )?;
    }
    write_end(xml, "menu")
}

fn write_remote_request<W: Write>(xml: &mut Writer<W>, request: &RemoteRequest) -> Result<()> {
    write_start(xml, BytesStart::new("remote-request"))?;
    write_post(xml, &request.post)?;
    write_command(xml, &request.command)?;
    write_instances(xml, &request.instances)?;
    write_start(xml, BytesStart::new("session"))?;
    for query in &request.queries {
        write_query(xml, query)?;
    }
    for datum in &request.datums {
        write_datum(xml, datum)?;
    }
    write_end(xml, "session")?;
    write_stack(xml, &request.stack)?;
    write_end(xml, "remote-request")
}

fn write_endpoint<W: Write>(xml: &mut Writer<W>, endpoint: &Endpoint) -> Result<()> {
    let respect_relevancy = (!endpoint.respect_relevancy).then_some(xml_bool(false));
    write_start(
        xml,
        element(
            "endpoint",
            &[
                ("id", Some(endpoint.id.as_str())),
                ("respect-relevancy", respect_relevancy),
            ],
        ),
    )?;
    for argument in &endpoint.arguments {
        write_empty(
            xml,
            element(
                "argument",
                &[
                    ("id", Some(argument.id.as_str())),
                    ("instance-id", argument.instance_id.as_deref()),
                    ("instance-src", argument.instance_src.as_deref()),
                ],
            ),
        )?;
    }
    write_stack(xml, &endpoint.stack)?;
    write_end(xml, "endpoint")
}

// ============================================================================
// Shared pieces
// ============================================================================

fn write_command<W: Write>(xml: &mut Writer<W>, command: &Command) -> Result<()> {
    write_start(xml, element("command", &[("id", Some(command.id.as_str()))]))?;
    write_locale_text(xml, &command.locale_id, &[])?;
    write_end(xml, "command")
}

fn write_instances<W: Write>(xml: &mut Writer<W>, instances: &[Instance]) -> Result<()> {
    for instance in instances {
        write_empty(
            xml,
            element(
                "instance",
                &[("id", Some(instance.id.as_str())), ("src", Some(instance.src.as_str()))],
            ),
        )?;
    }
    Ok(())
}

fn write_post<W: Write>(xml: &mut Writer<W>, post: &RemotePost) -> Result<()> {
    let start = element(
        "post",
        &[("url", Some(post.url.as_str())), ("relevant", post.relevant.as_deref())],
    );
    if post.data.is_empty() {
        return write_empty(xml, start);
    }
    write_start(xml, start)?;
    write_data(xml, &post.data)?;
    write_end(xml, "post")
}

fn write_data<W: Write>(xml: &mut Writer<W>, data: &[QueryData]) -> Result<()> {
    for item in data {
        write_empty(
            xml,
            element(
                "data",
                &[
                    ("key", Some(item.key.as_str())),
                    ("ref", Some(item.ref_.as_str())),
                    ("nodeset", item.nodeset.as_deref()),
                    ("exclude", item.exclude.as_deref()),
                ],
            ),
        )?;
    }
    Ok(())
}

fn write_datum<W: Write>(xml: &mut Writer<W>, datum: &Datum) -> Result<()> {
    match datum.kind {
        DatumKind::Query => match &datum.query {
            Some(query) => write_query(xml, query),
            None => Ok(()),
        },
        DatumKind::Computed => write_empty(
            xml,
            element(
                "datum",
                &[("id", Some(datum.id.as_str())), ("function", datum.function.as_deref())],
            ),
        ),
        DatumKind::Selection | DatumKind::InstanceSelection => {
            let instance = datum.kind == DatumKind::InstanceSelection;
            let max_select = datum
                .max_select_value
                .filter(|_| instance)
                .map(|value| value.to_string());
            write_empty(
                xml,
                element(
                    if instance { "instance-datum" } else { "datum" },
                    &[
                        ("id", Some(datum.id.as_str())),
                        ("nodeset", datum.nodeset.as_deref()),
                        ("value", datum.value.as_deref()),
                        ("detail-select", datum.detail_select.as_deref()),
                        ("detail-confirm", datum.detail_confirm.as_deref()),
                        ("detail-persistent", datum.detail_persistent.as_deref()),
                        ("detail-inline", datum.detail_inline.as_deref()),
                        ("autoselect", datum.autoselect.then_some(xml_bool(true))),
                        ("max-select-value", max_select.as_deref()),
                    ],
                ),
            )
        }
    }
}

fn write_query<W: Write>(xml: &mut Writer<W>, query: &QuerySpec) -> Result<()> {
    write_start(
        xml,
        element(
            "query",
            &[
                ("url", Some(query.url.as_str())),
                ("storage-instance", Some(query.storage_instance.as_str())),
                ("template", query.template.as_deref()),
                ("default_search", query.default_search.then_some(xml_bool(true))),
            ],
        ),
    )?;
    write_data(xml, &query.data)?;
    for prompt in &query.prompts {
        write_start(
            xml,
            element(
                "prompt",
                &[
                    ("key", Some(prompt.key.as_str())),
                    ("appearance", prompt.appearance.as_deref()),
                    ("input", prompt.input.as_deref()),
                    ("default", prompt.default_value.as_deref()),
                ],
            ),
        )?;
        write_start(xml, BytesStart::new("display"))?;
        write_locale_text(xml, &prompt.locale_id, &[])?;
        write_end(xml, "display")?;
        write_end(xml, "prompt")?;
    }
    write_end(xml, "query")
}

fn write_assertions<W: Write>(xml: &mut Writer<W>, assertions: &[Assertion]) -> Result<()> {
    if assertions.is_empty() {
        return Ok(());
    }
    write_start(xml, BytesStart::new("assertions"))?;
    for assertion in assertions {
        write_start(xml, element("assert", &[("test", Some(assertion.test.as_str()))]))?;
        write_locale_text(xml, &assertion.locale_id, &assertion.locale_args)?;
        write_end(xml, "assert")?;
    }
    write_end(xml, "assertions")
}

// ============================================================================
// Stack
// ============================================================================

fn write_stack<W: Write>(xml: &mut Writer<W>, frames: &[StackFrame]) -> Result<()> {
    if frames.is_empty() {
        return Ok(());
    }
    write_start(xml, BytesStart::new("stack"))?;
    for frame in frames {
        let name = frame.kind.as_str();
        let start = element(name, &[("if", frame.if_clause.as_deref())]);
        if frame.ops.is_empty() {
            write_empty(xml, start)?;
            continue;
        }
        write_start(xml, start)?;
        for op in &frame.ops {
            write_stack_op(xml, op)?;
        }
        write_end(xml, name)?;
    }
    write_end(xml, "stack")
}

fn write_stack_op<W: Write>(xml: &mut Writer<W>, op: &StackOp) -> Result<()> {
    match op {
        StackOp::PushCommand { command } => {
            let value = format!("'{command}'");
            write_empty(xml, element("command", &[("value", Some(value.as_str()))]))
        }
        StackOp::PushDatum { id, value, instance } => write_empty(
            xml,
            element(
                if *instance { "instance-datum" } else { "datum" },
                &[("id", Some(id.as_str())), ("value", Some(value.as_str()))],
            ),
        ),
        StackOp::PushQuery(query) => {
            let start = element(
                "query",
                &[("id", Some(query.id.as_str())), ("value", Some(query.value.as_str()))],
            );
            if query.data.is_empty() {
                return write_empty(xml, start);
            }
            write_start(xml, start)?;
            write_data(xml, &query.data)?;
            write_end(xml, "query")
        }
        StackOp::Rewind { value } => {
            write_empty(xml, element("rewind", &[("value", Some(value.as_str()))]))
        }
        StackOp::Mark => write_empty(xml, BytesStart::new("mark")),
        StackOp::Jump { url } => {
            write_start(xml, BytesStart::new("jump"))?;
            write_text_element(xml, "url", url)?;
            write_end(xml, "jump")
        }
    }
}
