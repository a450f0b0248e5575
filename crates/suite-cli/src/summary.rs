use std::path::Path;

use chrono::{SecondsFormat, Utc};
use comfy_table::modifiers::{UTF8_ROUND_CORNERS, UTF8_SOLID_INNER_BORDERS};
use comfy_table::presets::{UTF8_FULL, UTF8_FULL_CONDENSED};
use comfy_table::{
    Attribute, Cell, CellAlignment, Color, ColumnConstraint, ContentArrangement, Table, Width,
};

use suite_cli::types::{CompileResult, ModuleSummary, ValidateResult};
use suite_core::FormInspection;
use suite_model::{Datum, DiagnosticReport, Severity, StackOp};

pub fn print_summary(result: &CompileResult) {
    print_header(&result.app_name);
    println!("Output: {}", result.output_dir.display());
    print_output_path("Suite", result.suite_xml.as_deref());
    print_output_path("Diagnostics", result.diagnostics_json.as_deref());
    println!("{}", module_table(&result.modules, &result.report));
    let stats = &result.stats;
    println!(
        "Entries: {}  Menus: {}  Remote requests: {}  Endpoints: {}  Fixtures: {}  Cache: {} hit(s), {} miss(es)  ({} ms)",
        stats.entries,
        stats.menus,
        stats.remote_requests,
        stats.endpoints,
        stats.fixtures,
        stats.cache.hits,
        stats.cache.misses,
        stats.duration_ms
    );
    print_issue_table(&result.report);
    if !result.errors.is_empty() {
        eprintln!("Errors:");
        for error in &result.errors {
            eprintln!("- {error}");
        }
    }
}

pub fn print_validation(result: &ValidateResult) {
    print_header(&result.app_name);
    println!("{}", module_table(&result.modules, &result.report));
    print_issue_table(&result.report);
    if result.blocking {
        eprintln!("Validation failed.");
    }
}

pub fn print_plan(inspection: &FormInspection) {
    println!(
        "Form: {} (module {}, command {})",
        inspection.plan.form_id, inspection.module_id, inspection.command_id
    );
    let mut table = Table::new();
    table.set_header(vec![
        header_cell("#"),
        header_cell("Datum"),
        header_cell("Kind"),
        header_cell("Case type"),
        header_cell("Source"),
        header_cell("Detail"),
    ]);
    apply_table_style(&mut table);
    align_column(&mut table, 0, CellAlignment::Right);
    for (position, datum) in inspection.plan.datums.iter().enumerate() {
        table.add_row(vec![
            dim_cell(position),
            Cell::new(&datum.id).fg(Color::Blue).add_attribute(Attribute::Bold),
            Cell::new(datum.kind.as_str()),
            optional_cell(datum.case_type.as_ref().map(ToString::to_string)),
            optional_cell(datum_source(datum)),
            optional_cell(datum.detail_select.clone()),
        ]);
    }
    println!("{table}");
    for assertion in &inspection.plan.assertions {
        println!("assert {} ({})", assertion.test, assertion.locale_id);
    }

    println!();
    println!("Navigation ({}):", inspection.navigation.kind.as_str());
    for op in &inspection.navigation.ops {
        println!("  {}", describe_op(op));
    }
}

fn print_header(app_name: &str) {
    println!("App: {app_name}");
    println!(
        "Generated: {}",
        Utc::now().to_rfc3339_opts(SecondsFormat::Secs, true)
    );
}

fn print_output_path(label: &str, path: Option<&Path>) {
    match path {
        Some(path) => println!("{label}: {}", path.display()),
        None => println!("{label}: not written"),
    }
}

fn module_table(modules: &[ModuleSummary], report: &DiagnosticReport) -> Table {
    let mut table = Table::new();
    table.set_header(vec![
        header_cell("Module"),
        header_cell("Name"),
        header_cell("Type"),
        header_cell("Forms"),
        header_cell("Datums"),
        header_cell("Errors"),
        header_cell("Warnings"),
    ]);
    apply_summary_table_style(&mut table);
    for index in 3..7 {
        align_column(&mut table, index, CellAlignment::Right);
    }
    let mut total_forms = 0usize;
    let mut total_datums = None;
    for summary in modules {
        total_forms += summary.forms;
        if let Some(datums) = summary.datums {
            total_datums = Some(total_datums.unwrap_or(0) + datums);
        }
        table.add_row(vec![
            Cell::new(&summary.module_id)
                .fg(Color::Blue)
                .add_attribute(Attribute::Bold),
            Cell::new(&summary.name),
            Cell::new(summary.module_type),
            Cell::new(summary.forms),
            count_cell(summary.datums, Color::Reset),
            count_cell(Some(summary.errors), Color::Red),
            count_cell(Some(summary.warnings), Color::Yellow),
        ]);
    }
    // App-level findings have no module row but count towards the total.
    table.add_row(vec![
        Cell::new("TOTAL")
            .fg(Color::Cyan)
            .add_attribute(Attribute::Bold),
        Cell::new(format!("{} module(s)", modules.len()))
            .fg(Color::Cyan)
            .add_attribute(Attribute::Bold),
        dim_cell("-"),
        Cell::new(total_forms).add_attribute(Attribute::Bold),
        count_cell(total_datums, Color::Reset).add_attribute(Attribute::Bold),
        count_cell(Some(report.error_count()), Color::Red).add_attribute(Attribute::Bold),
        count_cell(Some(report.warning_count()), Color::Yellow).add_attribute(Attribute::Bold),
    ]);
    table
}

fn print_issue_table(report: &DiagnosticReport) {
    if report.diagnostics.is_empty() {
        return;
    }
    let mut issues: Vec<_> = report.diagnostics.iter().collect();
    // Stable sort keeps report order within a severity.
    issues.sort_by_key(|diagnostic| diagnostic.severity);

    let mut table = Table::new();
    table.set_header(vec![
        header_cell("Severity"),
        header_cell("Type"),
        header_cell("Module"),
        header_cell("Form"),
        header_cell("Reason"),
    ]);
    apply_issue_table_style(&mut table);
    align_column(&mut table, 0, CellAlignment::Center);
    for diagnostic in issues {
        table.add_row(vec![
            severity_cell(diagnostic.severity),
            Cell::new(diagnostic.kind.as_str()),
            optional_cell(diagnostic.module.as_ref().map(ToString::to_string)),
            optional_cell(diagnostic.form.as_ref().map(ToString::to_string)),
            Cell::new(&diagnostic.reason),
        ]);
    }
    println!();
    println!("Issues:");
    println!("{table}");
}

fn datum_source(datum: &Datum) -> Option<String> {
    datum
        .nodeset
        .clone()
        .or_else(|| datum.function.clone())
        .or_else(|| datum.query.as_ref().map(|query| query.url.clone()))
}

fn describe_op(op: &StackOp) -> String {
    match op {
        StackOp::PushCommand { command } => format!("command '{command}'"),
        StackOp::PushDatum { id, value, instance } => {
            let tag = if *instance { "instance-datum" } else { "datum" };
            format!("{tag} {id} = {value}")
        }
        StackOp::PushQuery(query) => format!("query {} = {}", query.id, query.value),
        StackOp::Rewind { value } => format!("rewind {value}"),
        StackOp::Mark => "mark".to_string(),
        StackOp::Jump { url } => format!("jump {url}"),
    }
}

fn apply_table_style(table: &mut Table) {
    table
        .load_preset(UTF8_FULL_CONDENSED)
        .apply_modifier(UTF8_ROUND_CORNERS)
        .set_content_arrangement(ContentArrangement::Dynamic)
        .set_width(140);
}

fn apply_summary_table_style(table: &mut Table) {
    table
        .load_preset(UTF8_FULL)
        .apply_modifier(UTF8_ROUND_CORNERS)
        .apply_modifier(UTF8_SOLID_INNER_BORDERS)
        .set_content_arrangement(ContentArrangement::DynamicFullWidth)
        .set_width(120);
    if table.column_count() >= 7 {
        table.set_constraints(vec![
            ColumnConstraint::UpperBoundary(Width::Fixed(20)),
            ColumnConstraint::UpperBoundary(Width::Percentage(35)),
            ColumnConstraint::LowerBoundary(Width::Fixed(8)),
            ColumnConstraint::LowerBoundary(Width::Fixed(7)),
            ColumnConstraint::LowerBoundary(Width::Fixed(8)),
            ColumnConstraint::LowerBoundary(Width::Fixed(8)),
            ColumnConstraint::LowerBoundary(Width::Fixed(10)),
        ]);
    }
}

fn apply_issue_table_style(table: &mut Table) {
    table
        .load_preset(UTF8_FULL)
        .apply_modifier(UTF8_ROUND_CORNERS)
        .apply_modifier(UTF8_SOLID_INNER_BORDERS)
        .set_content_arrangement(ContentArrangement::DynamicFullWidth)
        .set_width(160);
    if table.column_count() >= 5 {
        table.set_constraints(vec![
            ColumnConstraint::UpperBoundary(Width::Fixed(10)),
            ColumnConstraint::UpperBoundary(Width::Fixed(32)),
            ColumnConstraint::UpperBoundary(Width::Fixed(20)),
            ColumnConstraint::UpperBoundary(Width::Fixed(20)),
            ColumnConstraint::UpperBoundary(Width::Percentage(50)),
        ]);
    }
}

fn align_column(table: &mut Table, index: usize, alignment: CellAlignment) {
    if let Some(column) = table.column_mut(index) {
        column.set_cell_alignment(alignment);
    }
}

fn severity_cell(severity: Severity) -> Cell {
    match severity {
        Severity::Error => Cell::new("ERROR")
            .fg(Color::Red)
            .add_attribute(Attribute::Bold),
        Severity::Warning => Cell::new("WARN").fg(Color::Yellow),
    }
}

fn count_cell(count: Option<usize>, color: Color) -> Cell {
    match count {
        Some(value) if value > 0 => Cell::new(value).fg(color).add_attribute(Attribute::Bold),
        Some(value) => dim_cell(value),
        None => dim_cell("-"),
    }
}

fn optional_cell(value: Option<String>) -> Cell {
    match value {
        Some(value) => Cell::new(value),
        None => dim_cell("-"),
    }
}

fn header_cell(label: &str) -> Cell {
    Cell::new(label)
        .fg(Color::Cyan)
        .add_attribute(Attribute::Bold)
}

fn dim_cell<T: ToString>(value: T) -> Cell {
    Cell::new(value).fg(Color::DarkGrey)
}
