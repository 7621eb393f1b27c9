// ==========================================
// 学生体适能检测纪录 - 命令行入口
// ==========================================
// 用法:
//   fitness-records students <FILE> --school <ID> [--execute]
//   fitness-records records <FILE> --school <ID> [--grade N] [--class C] [--execute]
//   fitness-records template records --school <ID> --output roster.csv
// 输出: 预览 / 提交结果以 JSON 写到 stdout，日志写到 stderr
// ==========================================

use clap::{Args, Parser, Subcommand, ValueEnum};
use fitness_records::api::{ApiError, ImportApi};
use fitness_records::config::default_db_path;
use fitness_records::domain::{BatchKind, ImportScope};
use fitness_records::{logging, APP_NAME, VERSION};
use serde::Serialize;
use std::path::{Path, PathBuf};
use std::process::ExitCode;
use tracing::{error, info};

#[derive(Parser)]
#[command(name = "fitness-records", version, about = "學生體適能檢測紀錄 - 批次匯入")]
struct Cli {
    #[command(subcommand)]
    command: Command,

    /// 数据库文件（默认: FITNESS_RECORDS_DB_PATH 或使用者资料目录）
    #[arg(long = "db", value_name = "PATH", global = true)]
    db: Option<PathBuf>,

    /// 日志格式
    #[arg(long = "log-format", value_enum, default_value = "pretty", global = true)]
    log_format: LogFormat,
}

#[derive(Clone, Copy, ValueEnum)]
enum LogFormat {
    Pretty,
    Json,
}

#[derive(Subcommand)]
enum Command {
    /// 预览（并可提交）学生名册
    Students(UploadArgs),

    /// 预览（并可提交）检测成绩
    Records(UploadArgs),

    /// 产生导入模板
    Template(TemplateArgs),

    /// 新增学校
    AddSchool {
        name: String,
        #[arg(long)]
        county: Option<String>,
    },
}

#[derive(Args)]
struct ScopeArgs {
    #[arg(long = "school", value_name = "ID")]
    school_id: i64,

    /// 限定年级（成绩比对范围）
    #[arg(long)]
    grade: Option<i32>,

    /// 限定班级（成绩比对范围）
    #[arg(long = "class")]
    class_name: Option<String>,
}

impl ScopeArgs {
    fn to_scope(&self) -> ImportScope {
        let mut scope = ImportScope::school(self.school_id);
        if let Some(grade) = self.grade {
            scope = scope.with_grade(grade);
        }
        if let Some(class_name) = &self.class_name {
            scope = scope.with_class(class_name.as_str());
        }
        scope
    }
}

#[derive(Args)]
struct UploadArgs {
    #[arg(value_name = "FILE")]
    file: PathBuf,

    #[command(flatten)]
    scope: ScopeArgs,

    /// 预览后立即提交
    #[arg(long)]
    execute: bool,

    /// 提交时一并写入警告列
    #[arg(long = "include-warnings", requires = "execute")]
    include_warnings: bool,
}

#[derive(Args)]
struct TemplateArgs {
    #[arg(value_enum)]
    kind: TemplateKind,

    /// 预填名册（仅成绩模板）
    #[arg(long = "school", value_name = "ID")]
    school_id: Option<i64>,

    #[arg(long, requires = "school_id")]
    grade: Option<i32>,

    #[arg(long = "class", requires = "school_id")]
    class_name: Option<String>,

    #[arg(long, short, value_name = "PATH")]
    output: PathBuf,
}

#[derive(Clone, Copy, ValueEnum)]
enum TemplateKind {
    Students,
    Records,
}

#[derive(Serialize)]
struct ErrorOutput<'a> {
    error_code: &'a str,
    message: String,
}

fn print_json<T: Serialize>(value: &T) -> anyhow::Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

fn file_name_of(path: &Path) -> String {
    path.file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| path.display().to_string())
}

async fn run_upload(api: &ImportApi, kind: BatchKind, args: &UploadArgs) -> anyhow::Result<()> {
    let file_name = file_name_of(&args.file);
    let bytes = tokio::fs::read(&args.file).await?;
    // 先检查副档名 / 大小，再交给解析
    api.validate_upload(&file_name, bytes.len() as u64)?;

    let preview = match kind {
        BatchKind::Students => {
            api.preview_students_import(&file_name, bytes, args.scope.school_id)
                .await?
        }
        BatchKind::Records => {
            api.preview_records_import(&file_name, bytes, args.scope.to_scope())
                .await?
        }
    };
    info!(
        preview_id = %preview.preview_id,
        total = preview.total_rows,
        valid = preview.valid_rows,
        warning = preview.warning_rows,
        error = preview.error_rows,
        "预览完成"
    );

    if !args.execute {
        return print_json(&preview);
    }

    let result = api
        .execute_import(kind, &preview.preview_id, args.include_warnings)
        .await?;
    print_json(&result)
}

async fn run_template(api: &ImportApi, args: &TemplateArgs) -> anyhow::Result<()> {
    let bytes = match args.kind {
        TemplateKind::Students => api.students_template().await?,
        TemplateKind::Records => {
            let scope = args.school_id.map(|school_id| {
                ScopeArgs {
                    school_id,
                    grade: args.grade,
                    class_name: args.class_name.clone(),
                }
                .to_scope()
            });
            api.records_template(scope).await?
        }
    };
    tokio::fs::write(&args.output, bytes).await?;
    info!(output = %args.output.display(), "模板已写出");
    Ok(())
}

async fn run(cli: Cli) -> anyhow::Result<()> {
    let db_path = cli.db.unwrap_or_else(default_db_path);
    if let Some(parent) = db_path.parent().filter(|p| !p.as_os_str().is_empty()) {
        tokio::fs::create_dir_all(parent).await?;
    }
    let db_path = db_path.to_string_lossy().into_owned();
    info!(db_path = %db_path, "使用数据库");

    let api = ImportApi::new(&db_path).await?;
    let outcome = match &cli.command {
        Command::Students(args) => run_upload(&api, BatchKind::Students, args).await,
        Command::Records(args) => run_upload(&api, BatchKind::Records, args).await,
        Command::Template(args) => run_template(&api, args).await,
        Command::AddSchool { name, county } => {
            let id = api
                .service()
                .record_store()
                .create_school(name, county.as_deref())
                .map_err(ApiError::from)?;
            print_json(&serde_json::json!({ "school_id": id, "name": name }))
        }
    };
    api.shutdown().await;
    outcome
}

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();
    match cli.log_format {
        LogFormat::Pretty => logging::init(),
        LogFormat::Json => logging::init_json(),
    }
    info!("{} v{}", APP_NAME, VERSION);

    match run(cli).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            error!(error = %err, "执行失败");
            let error_code = err
                .downcast_ref::<ApiError>()
                .map(ApiError::error_code)
                .unwrap_or("INTERNAL_ERROR");
            let output = ErrorOutput {
                error_code,
                message: err.to_string(),
            };
            if let Ok(json) = serde_json::to_string_pretty(&output) {
                println!("{}", json);
            }
            ExitCode::FAILURE
        }
    }
}
