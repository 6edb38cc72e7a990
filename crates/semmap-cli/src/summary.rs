//! Table rendering for command output.

use comfy_table::modifiers::UTF8_ROUND_CORNERS;
use comfy_table::presets::UTF8_FULL_CONDENSED;
use comfy_table::{Attribute, Cell, CellAlignment, Color, ContentArrangement, Table};
use semmap_model::{EntityType, MappingProject};

pub fn projects_table(projects: &[MappingProject]) -> Table {
    let mut table = Table::new();
    table.set_header(vec![
        header_cell("ID"),
        header_cell("Name"),
        header_cell("Depth"),
        header_cell("Targets"),
        header_cell("Sources"),
    ]);
    apply_table_style(&mut table);
    align_column(&mut table, 2, CellAlignment::Right);
    for project in projects {
        let targets: Vec<&str> = project
            .mapping_targets()
            .iter()
            .map(|target| target.name())
            .collect();
        let sources: usize = project
            .mapping_targets()
            .iter()
            .map(|target| target.entity_mappings().len())
            .sum();
        table.add_row(vec![
            Cell::new(project.identifier().unwrap_or("-")),
            Cell::new(project.name()).add_attribute(Attribute::Bold),
            Cell::new(project.depth()),
            Cell::new(targets.join(", ")),
            count_cell(sources),
        ]);
    }
    table
}

/// One row per attribute mapping; sources without mappings get a single
/// placeholder row.
pub fn project_table(project: &MappingProject) -> Table {
    let mut table = Table::new();
    table.set_header(vec![
        header_cell("Target"),
        header_cell("Source"),
        header_cell("Attribute"),
        header_cell("Algorithm"),
        header_cell("State"),
    ]);
    apply_table_style(&mut table);
    for target in project.mapping_targets() {
        if target.entity_mappings().is_empty() {
            table.add_row(vec![
                Cell::new(target.name()),
                dim_cell("-"),
                dim_cell("-"),
                dim_cell("-"),
                dim_cell("-"),
            ]);
        }
        for entity_mapping in target.entity_mappings() {
            if entity_mapping.attribute_mappings().is_empty() {
                table.add_row(vec![
                    Cell::new(target.name()),
                    Cell::new(entity_mapping.name()),
                    dim_cell("-"),
                    dim_cell("-"),
                    dim_cell("-"),
                ]);
            }
            for mapping in entity_mapping.attribute_mappings() {
                table.add_row(vec![
                    Cell::new(target.name()),
                    Cell::new(entity_mapping.name()),
                    Cell::new(&mapping.target_attribute),
                    Cell::new(&mapping.algorithm),
                    Cell::new(format!("{:?}", mapping.algorithm_state)),
                ]);
            }
        }
    }
    table
}

pub fn entity_types_table(entity_types: &[EntityType]) -> Table {
    let mut table = Table::new();
    table.set_header(vec![
        header_cell("ID"),
        header_cell("Label"),
        header_cell("Package"),
        header_cell("Backend"),
        header_cell("Attributes"),
    ]);
    apply_table_style(&mut table);
    align_column(&mut table, 4, CellAlignment::Right);
    for entity_type in entity_types {
        table.add_row(vec![
            Cell::new(&entity_type.id).add_attribute(Attribute::Bold),
            Cell::new(&entity_type.label),
            optional_cell(entity_type.package.as_deref()),
            optional_cell(entity_type.backend.as_deref()),
            Cell::new(entity_type.attributes().len()),
        ]);
    }
    table
}

/// Outcome of one `apply` command.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ApplySummary {
    pub project: String,
    pub target_id: String,
    pub created: bool,
    pub rows: u64,
}

pub fn apply_table(summary: &ApplySummary) -> Table {
    let mut table = Table::new();
    table.set_header(vec![
        header_cell("Project"),
        header_cell("Target"),
        header_cell("Created"),
        header_cell("Rows"),
    ]);
    apply_table_style(&mut table);
    align_column(&mut table, 3, CellAlignment::Right);
    let created = if summary.created {
        Cell::new("yes").fg(Color::Green)
    } else {
        dim_cell("no")
    };
    table.add_row(vec![
        Cell::new(&summary.project),
        Cell::new(&summary.target_id).add_attribute(Attribute::Bold),
        created,
        count_cell(summary.rows as usize),
    ]);
    table
}

pub fn apply_table_style(table: &mut Table) {
    table
        .load_preset(UTF8_FULL_CONDENSED)
        .apply_modifier(UTF8_ROUND_CORNERS)
        .set_content_arrangement(ContentArrangement::Dynamic)
        .set_width(120);
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

fn dim_cell(value: impl ToString) -> Cell {
    Cell::new(value.to_string()).add_attribute(Attribute::Dim)
}

fn optional_cell(value: Option<&str>) -> Cell {
    match value {
        Some(value) => Cell::new(value),
        None => dim_cell("-"),
    }
}

fn count_cell(count: usize) -> Cell {
    if count > 0 {
        Cell::new(count).add_attribute(Attribute::Bold)
    } else {
        dim_cell(count)
    }
}
