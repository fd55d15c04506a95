//! Command handlers: thin glue from parsed args to engine calls.

use chrono::{Duration, Utc};
use serde_json::json;

use crate::app::AppContext;
use crate::core::{SkillProfile, TaskStatus};
use crate::engine::AssignMode;
use crate::error::{Result, TmError};

use super::{AssignArgs, Commands, EmployeeCommand, TaskCommand};

const DEFAULT_CONFIG: &str = "\
# TaskMatch configuration. Every value shown is the default.

#[storage]
#db_path = \"tm.db\"

#[embedding]
#backend = \"hash\"        # \"hash\" (offline) or \"api\" (remote model)
#dims = 384
#model = \"text-embedding-3-small\"
#endpoint = \"https://api.openai.com/v1/embeddings\"
#api_key_env = \"TM_EMBEDDING_API_KEY\"
#timeout_secs = 5

#[engine]
#top_k = 3
#alpha = 1.0
#lambda = 1.0
#workload_cap = 10
#urgency_horizon_hours = 72.0
";

pub fn run(ctx: &mut AppContext, command: &Commands, robot: bool) -> Result<()> {
    match command {
        Commands::Init => init(ctx, robot),
        Commands::Employee { command } => match command {
            EmployeeCommand::Add {
                name,
                skills,
                productivity,
            } => employee_add(ctx, name, skills, *productivity, robot),
            EmployeeCommand::List { all } => employee_list(ctx, *all, robot),
        },
        Commands::Task { command } => match command {
            TaskCommand::Add {
                title,
                priority,
                difficulty,
                skills,
                description,
                due_in_hours,
                creator,
            } => task_add(
                ctx,
                title,
                description,
                *priority,
                *difficulty,
                skills,
                creator,
                *due_in_hours,
                robot,
            ),
            TaskCommand::List { status } => task_list(ctx, status.as_deref(), robot),
        },
        Commands::Assign(args) => assign(ctx, args, robot),
        Commands::Complete { task_id } => complete(ctx, task_id, robot),
        Commands::ForceClose { task_id } => force_close(ctx, task_id, robot),
        Commands::Rework { task_id } => rework(ctx, task_id, robot),
        Commands::Recommend { task_id, k } => recommend(ctx, task_id, *k, robot),
        Commands::Stats => stats(ctx, robot),
    }
}

fn init(ctx: &AppContext, robot: bool) -> Result<()> {
    std::fs::create_dir_all(&ctx.root)?;
    let config_path = ctx.root.join("config.toml");
    let wrote_config = if config_path.exists() {
        false
    } else {
        std::fs::write(&config_path, DEFAULT_CONFIG)?;
        true
    };

    let schema_version = ctx.engine.database().schema_version();
    if robot {
        println!(
            "{}",
            json!({
                "root": ctx.root,
                "schema_version": schema_version,
                "wrote_config": wrote_config,
            })
        );
    } else {
        println!("Initialized {} (schema v{schema_version})", ctx.root.display());
        if wrote_config {
            println!("Wrote default config to {}", config_path.display());
        }
    }
    Ok(())
}

fn employee_add(
    ctx: &mut AppContext,
    name: &str,
    skill_specs: &[String],
    productivity: f64,
    robot: bool,
) -> Result<()> {
    let skills = skill_specs
        .iter()
        .map(|spec| parse_skill_spec(spec))
        .collect::<Result<Vec<_>>>()?;

    let employee = ctx.engine.add_employee(name, skills, productivity)?;
    if robot {
        println!("{}", serde_json::to_string(&employee)?);
    } else {
        println!("Added employee {} ({})", employee.name, employee.id);
    }
    Ok(())
}

fn employee_list(ctx: &AppContext, all: bool, robot: bool) -> Result<()> {
    let employees = ctx.engine.database().list_employees(!all)?;
    if robot {
        println!("{}", serde_json::to_string(&employees)?);
        return Ok(());
    }
    if employees.is_empty() {
        println!("No employees.");
        return Ok(());
    }
    for e in employees {
        let skills: Vec<String> = e.skill_names();
        println!(
            "{}  {}  workload={}  productivity={:.2}  skills=[{}]{}",
            e.id,
            e.name,
            e.workload,
            e.productivity_score,
            skills.join(", "),
            if e.active { "" } else { "  (inactive)" }
        );
    }
    Ok(())
}

#[allow(clippy::too_many_arguments)]
fn task_add(
    ctx: &mut AppContext,
    title: &str,
    description: &str,
    priority: u8,
    difficulty: u8,
    skills: &[String],
    creator: &str,
    due_in_hours: Option<i64>,
    robot: bool,
) -> Result<()> {
    let due_date = due_in_hours.map(|hours| Utc::now() + Duration::hours(hours));
    let task = ctx.engine.add_task(
        title,
        description,
        priority,
        difficulty,
        skills.to_vec(),
        creator,
        due_date,
    )?;

    if robot {
        println!("{}", serde_json::to_string(&task)?);
    } else {
        println!("Added task {} ({})", task.title, task.id);
    }
    Ok(())
}

fn task_list(ctx: &AppContext, status: Option<&str>, robot: bool) -> Result<()> {
    let status = status.map(TaskStatus::parse).transpose()?;
    let tasks = ctx.engine.database().list_tasks(status)?;
    if robot {
        println!("{}", serde_json::to_string(&tasks)?);
        return Ok(());
    }
    if tasks.is_empty() {
        println!("No tasks.");
        return Ok(());
    }
    for t in tasks {
        println!(
            "{}  [{}] p{} d{}  {}{}",
            t.id,
            t.status,
            t.priority,
            t.difficulty,
            t.title,
            t.assignee_id
                .as_deref()
                .map_or_else(String::new, |a| format!("  -> {a}")),
        );
    }
    Ok(())
}

fn assign(ctx: &mut AppContext, args: &AssignArgs, robot: bool) -> Result<()> {
    let mode = if args.employee.is_some() {
        AssignMode::Manual
    } else {
        AssignMode::Auto
    };
    let assignment =
        ctx.engine
            .assign_task(&args.task_id, mode, args.employee.as_deref(), &args.assigner)?;

    if robot {
        println!("{}", serde_json::to_string(&assignment)?);
    } else {
        println!(
            "Assigned task {} to {}",
            assignment.task_id, assignment.employee_id
        );
    }
    Ok(())
}

fn complete(ctx: &mut AppContext, task_id: &str, robot: bool) -> Result<()> {
    let feedback = ctx.engine.complete_task(task_id)?;
    if robot {
        println!("{}", serde_json::to_string(&feedback)?);
    } else {
        println!(
            "Completed task {}; reward {:.2} ({} overdue days)",
            task_id, feedback.components.reward_value, feedback.components.overdue_days
        );
    }
    Ok(())
}

fn force_close(ctx: &mut AppContext, task_id: &str, robot: bool) -> Result<()> {
    let feedback = ctx.engine.force_close_task(task_id)?;
    if robot {
        println!("{}", serde_json::to_string(&feedback)?);
    } else {
        println!(
            "Force-closed task {}; reward {:.2}",
            task_id, feedback.components.reward_value
        );
    }
    Ok(())
}

fn rework(ctx: &mut AppContext, task_id: &str, robot: bool) -> Result<()> {
    let count = ctx.engine.mark_rework(task_id)?;
    if robot {
        println!("{}", json!({ "task_id": task_id, "rework_count": count }));
    } else {
        println!("Recorded rework on task {task_id} (count: {count})");
    }
    Ok(())
}

fn recommend(ctx: &AppContext, task_id: &str, k: Option<usize>, robot: bool) -> Result<()> {
    let recommendations = ctx.engine.recommend(task_id, k)?;
    if robot {
        println!("{}", serde_json::to_string(&recommendations)?);
        return Ok(());
    }
    if recommendations.is_empty() {
        println!("No candidates.");
        return Ok(());
    }
    for (rank, r) in recommendations.iter().enumerate() {
        println!(
            "{}. {}  score={:.3} (predicted={:.3}, exploration={:.3}, similarity={:.3})",
            rank + 1,
            r.name,
            r.score,
            r.predicted,
            r.exploration,
            r.similarity
        );
    }
    Ok(())
}

fn stats(ctx: &AppContext, robot: bool) -> Result<()> {
    let summaries = ctx.engine.stats()?;
    if robot {
        println!("{}", serde_json::to_string(&summaries)?);
        return Ok(());
    }
    if summaries.is_empty() {
        println!("No learned state yet.");
        return Ok(());
    }
    for s in summaries {
        println!(
            "{}  {}  updates={}  feedback={}  mean_reward={}",
            s.employee_id,
            s.name,
            s.update_count,
            s.feedback_count,
            s.mean_reward
                .map_or_else(|| "-".to_string(), |m| format!("{m:.3}")),
        );
    }
    Ok(())
}

/// Parse `NAME[:EXPERIENCE_MONTHS[:TENURE_MONTHS]]`.
fn parse_skill_spec(spec: &str) -> Result<SkillProfile> {
    let mut parts = spec.splitn(3, ':');
    let name = parts
        .next()
        .map(str::trim)
        .filter(|n| !n.is_empty())
        .ok_or_else(|| TmError::Config(format!("empty skill spec: {spec:?}")))?;

    let parse_months = |raw: Option<&str>| -> Result<Option<u32>> {
        raw.map(|v| {
            v.trim()
                .parse::<u32>()
                .map_err(|_| TmError::Config(format!("bad months value in skill spec {spec:?}")))
        })
        .transpose()
    };

    Ok(SkillProfile {
        name: name.to_string(),
        experience_months: parse_months(parts.next())?,
        tenure_months: parse_months(parts.next())?,
    })
}
