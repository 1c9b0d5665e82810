use comfy_table::modifiers::{UTF8_ROUND_CORNERS, UTF8_SOLID_INNER_BORDERS};
use comfy_table::presets::UTF8_FULL_CONDENSED;
use comfy_table::{Attribute, Cell, CellAlignment, Color, ContentArrangement, Table};

use survey_cli::pipeline::PreparedWave;
use survey_model::{Schema, TransformReport, Variable};
use survey_store::{LoadOutcome, LoadPlan, SurveyId, WaveRecord};

pub fn print_wave_summary(
    survey: &SurveyId,
    poll_id: u64,
    prepared: &PreparedWave,
    load: Option<&LoadOutcome>,
) {
    println!("Survey: {survey}");
    println!("Poll: {poll_id}");
    println!(
        "Schema: {} question(s), {} variable(s), fingerprint {}",
        prepared.metadata.questions.len(),
        prepared.schema.len(),
        short_fingerprint(&prepared.schema)
    );
    print_report(&prepared.outcome.report);
    if let Some(load) = load {
        println!(
            "Committed wave {} with {} row(s) from {}{}",
            load.wave.load_counter,
            load.wave.rows,
            load.from,
            if load.attempts > 1 {
                format!(" after {} attempts", load.attempts)
            } else {
                String::new()
            }
        );
    }
}

fn print_report(report: &TransformReport) {
    let mut table = Table::new();
    table.set_header(vec![header_cell("Rows"), header_cell("Count")]);
    apply_table_style(&mut table);
    align_column(&mut table, 1, CellAlignment::Right);
    table.add_row(vec![Cell::new("Fetched"), Cell::new(report.input_rows)]);
    table.add_row(vec![
        dim_cell("Dropped: no answers"),
        count_cell(report.dropped_empty, Color::Yellow),
    ]);
    table.add_row(vec![
        dim_cell("Dropped: incomplete"),
        count_cell(report.dropped_incomplete, Color::Yellow),
    ]);
    for (kind, count) in report.rejected_by_kind() {
        table.add_row(vec![
            dim_cell(format!("Rejected: {kind}")),
            count_cell(count, Color::Red),
        ]);
    }
    table.add_row(vec![
        Cell::new("Validated")
            .fg(Color::Green)
            .add_attribute(Attribute::Bold),
        Cell::new(report.validated_rows).add_attribute(Attribute::Bold),
    ]);
    println!("{table}");
    println!(
        "Decoded {} choice value(s); split {} other answer(s).",
        report.decoded_values, report.other_splits
    );

    if report.rejected.is_empty() {
        return;
    }
    let mut rejections = Table::new();
    rejections.set_header(vec![
        header_cell("Row"),
        header_cell("Respondent"),
        header_cell("Variable"),
        header_cell("Reason"),
    ]);
    apply_table_style(&mut rejections);
    align_column(&mut rejections, 0, CellAlignment::Right);
    for rejection in &report.rejected {
        rejections.add_row(vec![
            Cell::new(rejection.row_index + 1),
            optional_cell(rejection.respondent_id.as_deref()),
            Cell::new(&rejection.variable).fg(Color::Blue),
            Cell::new(rejection.kind).fg(Color::Red),
        ]);
    }
    println!("{rejections}");
}

pub fn print_plan(plan: &LoadPlan) {
    match plan {
        LoadPlan::HistoryMismatch { diff } => {
            println!("Planned state: {}", plan.state());
            println!("{diff}");
        }
        _ => println!("Planned state: {plan}"),
    }
}

pub fn print_schema(schema: &Schema) {
    let mut table = Table::new();
    table.set_header(vec![
        header_cell("Variable"),
        header_cell("Source"),
        header_cell("Kind"),
        header_cell("Question type"),
        header_cell("Range"),
        header_cell("Domain"),
        header_cell("Label"),
    ]);
    apply_table_style(&mut table);
    for variable in schema.variables() {
        table.add_row(vec![
            Cell::new(&variable.name)
                .fg(Color::Blue)
                .add_attribute(Attribute::Bold),
            Cell::new(&variable.source),
            Cell::new(variable.kind),
            Cell::new(variable.question_type.name()),
            optional_cell(variable.range.map(|range| range.to_string()).as_deref()),
            optional_cell(domain_text(variable).as_deref()),
            optional_cell(variable.label.as_deref()),
        ]);
    }
    println!("{table}");
    println!("Fingerprint: {}", schema.fingerprint());
}

pub fn print_history(survey: &SurveyId, waves: &[WaveRecord]) {
    println!("Survey: {survey}");
    if waves.is_empty() {
        println!("No committed waves.");
        return;
    }
    let mut table = Table::new();
    table.set_header(vec![
        header_cell("Load counter"),
        header_cell("Poll"),
        header_cell("Rows"),
        header_cell("Committed at"),
    ]);
    apply_table_style(&mut table);
    align_column(&mut table, 0, CellAlignment::Right);
    align_column(&mut table, 2, CellAlignment::Right);
    let mut total = 0usize;
    for wave in waves {
        total += wave.rows;
        table.add_row(vec![
            Cell::new(wave.load_counter).add_attribute(Attribute::Bold),
            optional_cell(wave.poll_id.map(|poll| poll.to_string()).as_deref()),
            Cell::new(wave.rows),
            Cell::new(wave.committed_at.format("%Y-%m-%d %H:%M:%S UTC")),
        ]);
    }
    table.add_row(vec![
        Cell::new("TOTAL")
            .fg(Color::Cyan)
            .add_attribute(Attribute::Bold),
        dim_cell("-"),
        Cell::new(total).add_attribute(Attribute::Bold),
        dim_cell("-"),
    ]);
    println!("{table}");
}

fn domain_text(variable: &Variable) -> Option<String> {
    let domain = variable.domain.as_ref()?;
    Some(
        domain
            .choices()
            .iter()
            .map(|choice| format!("{}={}", choice.code, choice.label))
            .collect::<Vec<_>>()
            .join(", "),
    )
}

fn short_fingerprint(schema: &Schema) -> String {
    schema.fingerprint().chars().take(12).collect()
}

fn apply_table_style(table: &mut Table) {
    table
        .load_preset(UTF8_FULL_CONDENSED)
        .apply_modifier(UTF8_ROUND_CORNERS)
        .apply_modifier(UTF8_SOLID_INNER_BORDERS)
        .set_content_arrangement(ContentArrangement::Dynamic);
}

fn align_column(table: &mut Table, index: usize, alignment: CellAlignment) {
    if let Some(column) = table.column_mut(index) {
        column.set_cell_alignment(alignment);
    }
}

fn header_cell(label: &str) -> Cell {
    Cell::new(label)
        .fg(Color::Cyan)
        .add_attribute(Attribute::Bold)
}

fn count_cell(count: usize, color: Color) -> Cell {
    if count == 0 {
        dim_cell(count)
    } else {
        Cell::new(count).fg(color)
    }
}

fn optional_cell(value: Option<&str>) -> Cell {
    match value {
        Some(value) => Cell::new(value),
        None => dim_cell("-"),
    }
}

fn dim_cell<T: ToString>(value: T) -> Cell {
    Cell::new(value).fg(Color::DarkGrey)
}
