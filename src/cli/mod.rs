//! Command-line interface definitions.

pub mod commands;

use std::path::PathBuf;

use clap::{ArgAction, Args, Parser, Subcommand};

#[derive(Debug, Parser)]
#[command(
    name = "tm",
    version,
    about = "TaskMatch - learned task assignment",
    long_about = "Assign tasks to people with a semantic skill filter and a contextual \
                  bandit that learns from completion outcomes."
)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,

    /// Root data directory (default: platform data dir)
    #[arg(long, global = true, env = "TM_ROOT")]
    pub root: Option<PathBuf>,

    /// Explicit config file path
    #[arg(long, global = true)]
    pub config: Option<PathBuf>,

    /// Machine-readable JSON output
    #[arg(long, global = true)]
    pub robot: bool,

    /// Increase log verbosity (-v, -vv, -vvv)
    #[arg(short, long, global = true, action = ArgAction::Count)]
    pub verbose: u8,

    /// Suppress logging entirely
    #[arg(short, long, global = true)]
    pub quiet: bool,
}

#[derive(Debug, Subcommand)]
pub enum Commands {
    /// Initialize the data directory, database, and default config
    Init,

    /// Manage employees
    Employee {
        #[command(subcommand)]
        command: EmployeeCommand,
    },

    /// Manage tasks
    Task {
        #[command(subcommand)]
        command: TaskCommand,
    },

    /// Assign a task: auto-selected unless --employee is given
    Assign(AssignArgs),

    /// Complete a task and feed the outcome back into the recommender
    Complete {
        task_id: String,
    },

    /// Close a task as failed; the assignee's arm learns the penalty
    ForceClose {
        task_id: String,
    },

    /// Record rework on a task's open assignment
    Rework {
        task_id: String,
    },

    /// Preview assignment candidates without assigning
    Recommend {
        task_id: String,

        /// How many candidates to show (default: the filter's top-K)
        #[arg(short = 'k', long)]
        k: Option<usize>,
    },

    /// Show learned per-employee bandit state
    Stats,
}

#[derive(Debug, Subcommand)]
pub enum EmployeeCommand {
    /// Register an employee
    Add {
        name: String,

        /// Skill as NAME[:EXPERIENCE_MONTHS[:TENURE_MONTHS]]; repeatable
        #[arg(long = "skill", value_name = "SKILL")]
        skills: Vec<String>,

        /// Productivity score in [0, 1]
        #[arg(long, default_value_t = 0.5)]
        productivity: f64,
    },

    /// List employees
    List {
        /// Include inactive employees
        #[arg(long)]
        all: bool,
    },
}

#[derive(Debug, Subcommand)]
pub enum TaskCommand {
    /// Create a task
    Add {
        title: String,

        /// Priority 1-5, higher is more urgent
        #[arg(long, default_value_t = 3)]
        priority: u8,

        /// Difficulty 1-10
        #[arg(long, default_value_t = 5)]
        difficulty: u8,

        /// Required skill; repeatable
        #[arg(long = "skill", value_name = "SKILL")]
        skills: Vec<String>,

        #[arg(long, default_value = "")]
        description: String,

        /// Due this many hours from now
        #[arg(long, value_name = "HOURS")]
        due_in_hours: Option<i64>,

        #[arg(long, default_value = "admin")]
        creator: String,
    },

    /// List tasks
    List {
        /// Filter by status: todo, in_progress, review, done
        #[arg(long)]
        status: Option<String>,
    },
}

#[derive(Debug, Args)]
pub struct AssignArgs {
    pub task_id: String,

    /// Assign to this employee instead of auto-selecting
    #[arg(long)]
    pub employee: Option<String>,

    /// Who is assigning
    #[arg(long, default_value = "admin")]
    pub assigner: String,
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn cli_definition_is_consistent() {
        Cli::command().debug_assert();
    }

    #[test]
    fn parses_auto_assign() {
        let cli = Cli::parse_from(["tm", "assign", "task-1"]);
        match cli.command {
            Commands::Assign(args) => {
                assert_eq!(args.task_id, "task-1");
                assert!(args.employee.is_none());
            }
            other => panic!("unexpected command: {other:?}"),
        }
    }

    #[test]
    fn parses_repeatable_skills() {
        let cli = Cli::parse_from([
            "tm", "employee", "add", "Ada", "--skill", "rust:24:12", "--skill", "sql",
        ]);
        match cli.command {
            Commands::Employee {
                command: EmployeeCommand::Add { skills, .. },
            } => assert_eq!(skills.len(), 2),
            other => panic!("unexpected command: {other:?}"),
        }
    }
}
