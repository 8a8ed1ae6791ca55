mod common;

use std::collections::BTreeMap;

use bundle_generate::error::{GenerateError, WorkspaceError};
use bundle_generate::generate::{generate, resource_document, GenerateOptions, Target};
use bundle_generate::resources::app::App;
use bundle_generate::resources::job::{
    Job, JobParameter, JobSettings, NotebookTask, Source, SparkPythonTask, SqlTask, SqlTaskFile,
    Task, TaskDependency,
};
use bundle_generate::resources::normalize_key;
use bundle_generate::resources::pipeline::{
    self, LibraryPath, Pipeline, PipelineLibrary, PipelineSpec,
};
use bundle_generate::saver::Saver;
use bundle_generate::value::Value;
use bundle_generate::workspace::{Language, MockResourceClient};
use common::FakeWorkspace;
use tempfile::{tempdir, TempDir};

fn options(tmp: &TempDir) -> GenerateOptions {
    GenerateOptions {
        config_dir: tmp.path().join("resources"),
        source_dir: tmp.path().join("src"),
        ..Default::default()
    }
}

fn nightly_job() -> Job {
    Job {
        job_id: 11,
        creator_user_name: Some("me@example.com".to_string()),
        settings: JobSettings {
            name: Some("Nightly ETL!".to_string()),
            format: Some("MULTI_TASK".to_string()),
            tasks: vec![
                Task {
                    task_key: "ingest".to_string(),
                    existing_cluster_id: Some("shared-cluster".to_string()),
                    notebook_task: Some(NotebookTask {
                        notebook_path: "/Users/me/etl/ingest".to_string(),
                        ..Default::default()
                    }),
                    ..Default::default()
                },
                Task {
                    task_key: "report".to_string(),
                    depends_on: vec![TaskDependency {
                        task_key: "ingest".to_string(),
                        outcome: None,
                    }],
                    spark_python_task: Some(SparkPythonTask {
                        python_file: "/Users/me/etl/report.py".to_string(),
                        source: None,
                        parameters: vec!["--full".to_string()],
                    }),
                    ..Default::default()
                },
            ],
            parameters: vec![JobParameter {
                name: "env".to_string(),
                default: String::new(),
            }],
            tags: BTreeMap::from([
                ("team".to_string(), "data".to_string()),
                ("tier".to_string(), "1".to_string()),
            ]),
            ..Default::default()
        },
    }
}

fn etl_workspace() -> FakeWorkspace {
    FakeWorkspace::new()
        .with_notebook("/Users/me/etl/ingest", Language::Python, "spark.read.table('x')\n")
        .with_file("/Users/me/etl/report.py", "print('report')\n")
}

const NIGHTLY_YAML: &str = r#"resources:
  jobs:
    nightly_etl:
      name: Nightly ETL!
      tasks:
        - task_key: ingest
          existing_cluster_id: shared-cluster
          notebook_task:
            notebook_path: ../src/ingest.py
        - task_key: report
          depends_on:
            - task_key: ingest
          spark_python_task:
            python_file: ../src/report.py
            parameters:
              - "--full"
      parameters:
        - name: env
          default: ""
      tags:
        "team": "data"
        "tier": "1"
"#;

#[tokio::test]
async fn generates_job_config_and_downloads_its_files() {
    let tmp = tempdir().unwrap();
    let options = options(&tmp);
    let workspace = etl_workspace();
    let mut resources = MockResourceClient::new();
    resources
        .expect_get_job()
        .times(1)
        .returning(|_| Ok(nightly_job()));

    let report = generate(&Target::Job { job_id: 11 }, &options, &workspace, &resources)
        .await
        .expect("generation should succeed");

    assert_eq!(report.key, "nightly_etl");
    assert_eq!(report.config_file, options.config_dir.join("nightly_etl.job.yml"));
    assert_eq!(
        std::fs::read_to_string(&report.config_file).unwrap(),
        NIGHTLY_YAML
    );
    assert_eq!(
        report.downloaded,
        vec![
            options.source_dir.join("ingest.py"),
            options.source_dir.join("report.py"),
        ]
    );
    assert_eq!(
        std::fs::read_to_string(options.source_dir.join("ingest.py")).unwrap(),
        "spark.read.table('x')\n"
    );
}

#[tokio::test]
async fn second_run_needs_force() {
    let tmp = tempdir().unwrap();
    let mut options = options(&tmp);
    let workspace = etl_workspace();
    let mut resources = MockResourceClient::new();
    resources.expect_get_job().returning(|_| Ok(nightly_job()));
    let target = Target::Job { job_id: 11 };

    let first = generate(&target, &options, &workspace, &resources).await.unwrap();
    let first_yaml = std::fs::read_to_string(&first.config_file).unwrap();
    let err = generate(&target, &options, &workspace, &resources)
        .await
        .unwrap_err();
    assert!(matches!(err, GenerateError::AlreadyExists(_)), "got {err:?}");

    options.force = true;
    let second = generate(&target, &options, &workspace, &resources).await.unwrap();

    assert_eq!(second.config_file, first.config_file);
    assert_eq!(
        std::fs::read_to_string(&second.config_file).unwrap(),
        first_yaml,
        "regenerating an unchanged job must give identical YAML"
    );
}

#[tokio::test]
async fn explicit_key_wins() {
    let tmp = tempdir().unwrap();
    let options = GenerateOptions {
        key: Some("etl".to_string()),
        ..options(&tmp)
    };
    let workspace = etl_workspace();
    let mut resources = MockResourceClient::new();
    resources.expect_get_job().returning(|_| Ok(nightly_job()));

    let report = generate(&Target::Job { job_id: 11 }, &options, &workspace, &resources)
        .await
        .unwrap();

    assert_eq!(report.config_file, options.config_dir.join("etl.job.yml"));
    let yaml: serde_yaml::Value =
        serde_yaml::from_str(&std::fs::read_to_string(&report.config_file).unwrap()).unwrap();
    assert_eq!(yaml["resources"]["jobs"]["etl"]["name"].as_str(), Some("Nightly ETL!"));
}

#[tokio::test]
async fn git_sourced_tasks_are_left_alone() {
    let tmp = tempdir().unwrap();
    let options = options(&tmp);
    // Nothing is registered, so the workspace is never asked.
    let workspace = FakeWorkspace::new();
    let mut job = nightly_job();
    job.settings.git_source = Some(serde_json::json!({
        "git_url": "https://github.com/example/etl",
        "git_branch": "main",
    }));
    let mut resources = MockResourceClient::new();
    resources.expect_get_job().return_once(move |_| Ok(job));

    let report = generate(&Target::Job { job_id: 11 }, &options, &workspace, &resources)
        .await
        .unwrap();

    assert!(report.downloaded.is_empty());
    let yaml: serde_yaml::Value =
        serde_yaml::from_str(&std::fs::read_to_string(&report.config_file).unwrap()).unwrap();
    let task = &yaml["resources"]["jobs"]["nightly_etl"]["tasks"][0];
    assert_eq!(
        task["notebook_task"]["notebook_path"].as_str(),
        Some("/Users/me/etl/ingest")
    );
    assert_eq!(
        yaml["resources"]["jobs"]["nightly_etl"]["git_source"]["git_branch"].as_str(),
        Some("main")
    );
}

#[tokio::test]
async fn sql_file_tasks_are_downloaded_unless_from_git() {
    let tmp = tempdir().unwrap();
    let options = options(&tmp);
    let workspace = FakeWorkspace::new().with_file("/Shared/queries/daily.sql", "SELECT 1;\n");
    let sql_task = |path: &str, source| Task {
        task_key: path.rsplit('/').next().unwrap_or_default().to_string(),
        sql_task: Some(SqlTask {
            warehouse_id: "wh1".to_string(),
            file: Some(SqlTaskFile {
                path: path.to_string(),
                source,
            }),
            ..Default::default()
        }),
        ..Default::default()
    };
    let job = Job {
        job_id: 7,
        settings: JobSettings {
            name: Some("queries".to_string()),
            tasks: vec![
                sql_task("/Shared/queries/daily.sql", Some(Source::Workspace)),
                sql_task("queries/weekly.sql", Some(Source::Git)),
            ],
            ..Default::default()
        },
        ..Default::default()
    };
    let mut resources = MockResourceClient::new();
    resources.expect_get_job().return_once(move |_| Ok(job));

    let report = generate(&Target::Job { job_id: 7 }, &options, &workspace, &resources)
        .await
        .unwrap();

    assert_eq!(report.downloaded, vec![options.source_dir.join("daily.sql")]);
    let yaml: serde_yaml::Value =
        serde_yaml::from_str(&std::fs::read_to_string(&report.config_file).unwrap()).unwrap();
    let tasks = &yaml["resources"]["jobs"]["queries"]["tasks"];
    assert_eq!(tasks[0]["sql_task"]["file"]["path"].as_str(), Some("../src/daily.sql"));
    assert_eq!(tasks[1]["sql_task"]["file"]["path"].as_str(), Some("queries/weekly.sql"));
}

#[tokio::test]
async fn missing_job_surfaces_not_found_and_writes_nothing() {
    let tmp = tempdir().unwrap();
    let options = options(&tmp);
    let workspace = FakeWorkspace::new();
    let mut resources = MockResourceClient::new();
    resources.expect_get_job().returning(|id| {
        Err(WorkspaceError::NotFound {
            path: format!("job {id}"),
        })
    });

    let err = generate(&Target::Job { job_id: 404 }, &options, &workspace, &resources)
        .await
        .unwrap_err();

    assert!(
        matches!(err, GenerateError::Workspace(WorkspaceError::NotFound { .. })),
        "got {err:?}"
    );
    assert!(!options.config_dir.exists());
}

#[tokio::test]
async fn generates_pipeline_config() {
    let tmp = tempdir().unwrap();
    let options = options(&tmp);
    let workspace = FakeWorkspace::new()
        .with_notebook("/Users/me/dlt/bronze", Language::Sql, "CREATE LIVE TABLE b AS SELECT 1")
        .with_file("/Users/me/dlt/silver.py", "import dlt\n");
    let pipeline = Pipeline {
        pipeline_id: "abc-123".to_string(),
        name: Some("DLT Pipeline".to_string()),
        state: Some("IDLE".to_string()),
        spec: PipelineSpec {
            id: Some("abc-123".to_string()),
            name: Some("DLT Pipeline".to_string()),
            storage: Some("dbfs:/pipelines/abc-123".to_string()),
            development: Some(true),
            configuration: BTreeMap::from([("bronze.enabled".to_string(), "true".to_string())]),
            libraries: vec![
                PipelineLibrary {
                    notebook: Some(LibraryPath {
                        path: "/Users/me/dlt/bronze".to_string(),
                    }),
                    ..Default::default()
                },
                PipelineLibrary {
                    file: Some(LibraryPath {
                        path: "/Users/me/dlt/silver.py".to_string(),
                    }),
                    ..Default::default()
                },
            ],
            ..Default::default()
        },
        ..Default::default()
    };
    let mut resources = MockResourceClient::new();
    resources
        .expect_get_pipeline()
        .return_once(move |_| Ok(pipeline));

    let report = generate(
        &Target::Pipeline {
            pipeline_id: "abc-123".to_string(),
        },
        &options,
        &workspace,
        &resources,
    )
    .await
    .unwrap();

    assert_eq!(
        report.config_file,
        options.config_dir.join("dlt_pipeline.pipeline.yml")
    );
    let text = std::fs::read_to_string(&report.config_file).unwrap();
    let yaml: serde_yaml::Value = serde_yaml::from_str(&text).unwrap();
    let spec = &yaml["resources"]["pipelines"]["dlt_pipeline"];
    assert_eq!(spec["name"].as_str(), Some("DLT Pipeline"));
    assert_eq!(spec["libraries"][0]["notebook"]["path"].as_str(), Some("../src/bronze.sql"));
    assert_eq!(spec["libraries"][1]["file"]["path"].as_str(), Some("../src/silver.py"));
    assert_eq!(spec["configuration"]["bronze.enabled"].as_str(), Some("true"));
    assert_eq!(spec["development"].as_bool(), Some(true));
    assert!(spec.get("id").is_none(), "id must be dropped:\n{text}");
    assert!(spec.get("storage").is_none(), "storage must be dropped:\n{text}");
    assert!(text.contains("\n      name: DLT Pipeline\n"), "name must lead:\n{text}");
    assert!(options.source_dir.join("bronze.sql").exists());
}

#[tokio::test]
async fn generates_app_config_with_source_directory() {
    let tmp = tempdir().unwrap();
    let options = options(&tmp);
    let workspace = FakeWorkspace::new()
        .with_dir("/Workspace/Users/me/my-app")
        .with_file("/Workspace/Users/me/my-app/app.py", "import streamlit\n")
        .with_file("/Workspace/Users/me/my-app/app.yaml", "command: [streamlit, run, app.py]\n")
        .with_dir("/Workspace/Users/me/my-app/node_modules")
        .with_file("/Workspace/Users/me/my-app/node_modules/x.js", "");
    let app = App {
        name: "my-app".to_string(),
        description: Some("Dashboards for the team".to_string()),
        default_source_code_path: Some("/Workspace/Users/me/my-app".to_string()),
        url: Some("https://my-app.example.com".to_string()),
        resources: vec![serde_json::json!({
            "name": "warehouse",
            "sql_warehouse": {"id": "wh1", "permission": "CAN_USE"},
        })],
        ..Default::default()
    };
    let mut resources = MockResourceClient::new();
    resources.expect_get_app().return_once(move |_| Ok(app));

    let report = generate(
        &Target::App {
            name: "my-app".to_string(),
        },
        &options,
        &workspace,
        &resources,
    )
    .await
    .unwrap();

    assert_eq!(report.key, "my_app");
    assert_eq!(
        std::fs::read_to_string(&report.config_file).unwrap(),
        "resources:\n  apps:\n    my_app:\n      name: my-app\n      description: Dashboards for the team\n      source_code_path: ../src\n      resources:\n        - name: warehouse\n          sql_warehouse:\n            id: wh1\n            permission: CAN_USE\n"
    );
    assert!(options.source_dir.join("app.py").exists());
    assert!(options.source_dir.join("app.yaml").exists());
    assert!(!options.source_dir.join("node_modules").exists());
}

#[test]
fn pipeline_cluster_spark_conf_is_quoted() {
    let pipeline = Pipeline {
        spec: PipelineSpec {
            name: Some("dlt".to_string()),
            clusters: vec![serde_json::json!({
                "label": "default",
                "num_workers": 2,
                "spark_conf": {"spark.executor.memory": "1g", "spark.speculation": "true"},
            })],
            ..Default::default()
        },
        ..Default::default()
    };

    let value = pipeline::convert_pipeline_to_value(&pipeline).unwrap();
    let text = pipeline::saver().render(&value);

    assert_eq!(
        text,
        "name: dlt\nclusters:\n  - label: default\n    num_workers: 2\n    spark_conf:\n      \"spark.executor.memory\": \"1g\"\n      \"spark.speculation\": \"true\"\n"
    );
}

#[test]
fn document_nests_under_section_and_key() {
    let doc = resource_document("jobs", "k", Value::from("v"));
    assert_eq!(Saver::new().render(&doc), "resources:\n  jobs:\n    k: v\n");
}

#[test]
fn keys_are_normalized_names() {
    assert_eq!(normalize_key("Nightly ETL!"), "nightly_etl");
    assert_eq!(normalize_key("  my--app__v2 "), "my_app_v2");
    assert_eq!(normalize_key("Ünïcode Job"), "ünïcode_job");
}
