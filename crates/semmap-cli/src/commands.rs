//! Command implementations.

use std::io::Write;
use std::sync::Arc;

use anyhow::{Context, Result, anyhow};
use semmap_engine::{ApplyRequest, AttributeReferenceEvaluator, MappingService, TracingProgress};
use semmap_model::{MappingProject, MappingTarget};
use semmap_store::{SemmapConfig, Workspace};
use tracing::{info, info_span};

use crate::cli::{
    AddSourceArgs, ApplyArgs, Cli, Command, CreateArgs, EstimateArgs, MapArgs, ProjectCommand,
};
use crate::progress::BarProgress;
use crate::summary::{ApplySummary, apply_table, entity_types_table, project_table, projects_table};

/// An opened workspace and the service bound to it.
pub struct Session {
    pub workspace: Workspace,
    pub service: MappingService,
}

impl Session {
    pub fn open(cli: &Cli) -> Result<Self> {
        let mut config = SemmapConfig::load(&cli.workspace)
            .with_context(|| format!("load configuration in {}", cli.workspace.display()))?;
        if let Some(batch_size) = cli.batch_size {
            config = config.with_batch_size(batch_size);
            config.validate(&cli.workspace)?;
        }
        let workspace = Workspace::open_with_config(&cli.workspace, config)
            .with_context(|| format!("open workspace {}", cli.workspace.display()))?;
        let rules = workspace.rule_store().context("open rule store")?;
        let service = MappingService::new(
            Arc::new(rules),
            workspace.catalog(),
            Arc::new(AttributeReferenceEvaluator),
        )
        .with_batch_size(workspace.config().batch_size);
        Ok(Self { workspace, service })
    }

    fn project(&self, id: &str) -> Result<MappingProject> {
        self.service
            .get_mapping_project(id)?
            .ok_or_else(|| anyhow!("unknown mapping project: {id}"))
    }
}

/// Runs the parsed command, writing human-readable output to `out`.
pub fn run(cli: &Cli, out: &mut dyn Write) -> Result<()> {
    let session = Session::open(cli)?;
    match &cli.command {
        Command::Project(command) => run_project(&session, command, out),
        Command::Estimate(args) => run_estimate(&session, args, out),
        Command::Compatible(args) => run_compatible(&session, &args.schema, out),
        Command::Apply(args) => {
            let summary = run_apply(&session, args)?;
            writeln!(out, "{}", apply_table(&summary))?;
            Ok(())
        }
    }
}

fn run_project(session: &Session, command: &ProjectCommand, out: &mut dyn Write) -> Result<()> {
    let service = &session.service;
    match command {
        ProjectCommand::Create(CreateArgs {
            name,
            target,
            depth,
        }) => {
            let project = service.add_mapping_project(name, target, *depth)?;
            writeln!(
                out,
                "Created project {} ({})",
                project.name(),
                project.identifier().unwrap_or_default()
            )?;
        }
        ProjectCommand::List => {
            let projects = service.get_all_mapping_projects()?;
            if projects.is_empty() {
                writeln!(out, "No mapping projects.")?;
            } else {
                writeln!(out, "{}", projects_table(&projects))?;
            }
        }
        ProjectCommand::Show { project } => {
            let project = session.project(project)?;
            writeln!(out, "Project: {} (depth {})", project.name(), project.depth())?;
            writeln!(out, "{}", project_table(&project))?;
        }
        ProjectCommand::Clone { project, name } => {
            let copy = match name {
                Some(name) => service.clone_mapping_project_as(project, name)?,
                None => service.clone_mapping_project(project)?,
            };
            writeln!(
                out,
                "Cloned project {} as {}",
                project,
                copy.identifier().unwrap_or_default()
            )?;
        }
        ProjectCommand::Delete { project } => {
            service.delete_mapping_project(project)?;
            writeln!(out, "Deleted project {project}")?;
        }
        ProjectCommand::AddSource(args) => add_source(session, args, out)?,
        ProjectCommand::Map(args) => map_attribute(session, args, out)?,
    }
    Ok(())
}

fn select_target<'a>(
    project: &'a mut MappingProject,
    target: Option<&str>,
) -> Result<&'a mut MappingTarget> {
    let name = project.name().to_string();
    let selected = match target {
        Some(id) => project.mapping_target_mut(id),
        None => project.mapping_targets_mut().first_mut(),
    };
    selected.ok_or_else(|| match target {
        Some(id) => anyhow!("mapping project {name} has no mapping target for {id}"),
        None => anyhow!("mapping project {name} has no mapping target"),
    })
}

fn add_source(session: &Session, args: &AddSourceArgs, out: &mut dyn Write) -> Result<()> {
    let mut project = session.project(&args.project)?;
    let source = session
        .service
        .catalog()
        .entity_type(&args.source)
        .ok_or_else(|| anyhow!("unknown entity type: {}", args.source))?;
    let target = select_target(&mut project, args.target.as_deref())?;
    let target_name = target.name().to_string();
    target.add_source(source)?;
    session.service.update_mapping_project(&project)?;
    writeln!(out, "Added source {} to {}", args.source, target_name)?;
    Ok(())
}

fn map_attribute(session: &Session, args: &MapArgs, out: &mut dyn Write) -> Result<()> {
    let mut project = session.project(&args.project)?;
    let target = select_target(&mut project, args.target.as_deref())?;
    let entity_mapping = target
        .mapping_for_source_mut(&args.source)
        .ok_or_else(|| anyhow!("{} is not a source of {}", args.source, args.project))?;
    if entity_mapping.attribute_mapping(&args.attribute).is_none() {
        entity_mapping.add_attribute_mapping(&args.attribute)?;
    }
    entity_mapping
        .attribute_mapping_mut(&args.attribute)
        .ok_or_else(|| anyhow!("attribute mapping {} was not added", args.attribute))?
        .set_algorithm(args.expression.as_str());
    session.service.update_mapping_project(&project)?;
    writeln!(
        out,
        "Mapped {}.{} = {}",
        args.source, args.attribute, args.expression
    )?;
    Ok(())
}

fn run_estimate(session: &Session, args: &EstimateArgs, out: &mut dyn Write) -> Result<()> {
    let mut project = session.project(&args.project)?;
    let depth = project.depth();
    let target = select_target(&mut project, args.target.as_deref())?;
    let units = session.service.calculate_max_progress(target, depth)?;
    writeln!(
        out,
        "{} work units for {} (batch size {})",
        units,
        target.name(),
        session.service.batch_size()
    )?;
    Ok(())
}

fn run_compatible(session: &Session, schema: &str, out: &mut dyn Write) -> Result<()> {
    let schema = session
        .service
        .catalog()
        .entity_type(schema)
        .ok_or_else(|| anyhow!("unknown entity type: {schema}"))?;
    let compatible = session.service.get_compatible_entity_types(&schema);
    writeln!(out, "{}", entity_types_table(&compatible))?;
    Ok(())
}

/// Applies a project and saves the workspace. Nothing is saved when the run
/// fails.
pub fn run_apply(session: &Session, args: &ApplyArgs) -> Result<ApplySummary> {
    let span = info_span!("apply", project = %args.project, target = %args.target_id);
    let _guard = span.enter();

    let mut request = ApplyRequest::new(&args.project, &args.target_id)
        .with_create_new(args.create_new);
    if let Some(package) = &args.package {
        request = request.with_package(package);
    }
    if let Some(label) = &args.label {
        request = request.with_label(label);
    }
    if let Some(add) = args.source_attribute() {
        request = request.with_source_attribute(add);
    }
    if let Some(target) = &args.mapping_target {
        request = request.with_mapping_target(target);
    }

    let result = if args.no_progress {
        session
            .service
            .apply_mappings(&request, &TracingProgress::new())
    } else {
        let bar = BarProgress::new();
        let result = session.service.apply_mappings(&request, &bar);
        bar.finish();
        result
    };
    let rows = result.with_context(|| format!("apply project {}", args.project))?;

    session.workspace.save().context("save workspace")?;
    info!(rows, target = %args.target_id, "saved mapped rows");
    Ok(ApplySummary {
        project: args.project.clone(),
        target_id: args.target_id.clone(),
        created: args.create_new,
        rows,
    })
}
