//! End-to-end lifecycle scenarios against an in-memory job kind.

use async_trait::async_trait;
use chrono::{Duration as ChronoDuration, Utc};
use job_lifecycle::api::{JobConditionType, JobStatus};
use job_lifecycle::classify::{POD_FAILED, POD_RUNNING, POD_SUCCEEDED};
use job_lifecycle::labels::{gen_general_name, gen_labels, LABEL_REPLICA_INDEX, LABEL_REPLICA_TYPE};
use job_lifecycle::{
    cleanup_job, delete_pods_and_services, past_active_deadline, past_backoff_limit, status,
    CleanPodPolicy, ControllerConfig, Finalization, JobAdapter, JobController, LifecycleDecision,
    ReplicaSpecs, ReplicaType, Result, RunPolicy,
};
use k8s_openapi::api::core::v1::{ContainerStatus, Pod, PodStatus, Service};
use k8s_openapi::apimachinery::pkg::apis::meta::v1::{ObjectMeta, Time};
use kube::ResourceExt;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

struct TestJob {
    name: String,
}

/// Job kind backed by plain vectors, deleting by name.
#[derive(Default)]
struct TestJobController {
    pods: Mutex<Vec<Pod>>,
    services: Mutex<Vec<Service>>,
    job_present: Mutex<bool>,
    delete_calls: AtomicUsize,
    status_updates: Mutex<Vec<JobStatus>>,
}

impl TestJobController {
    fn with(pods: Vec<Pod>, services: Vec<Service>) -> Self {
        Self {
            pods: Mutex::new(pods),
            services: Mutex::new(services),
            job_present: Mutex::new(true),
            ..Self::default()
        }
    }

    fn pod_names(&self) -> Vec<String> {
        self.pods.lock().unwrap().iter().map(|p| p.name_any()).collect()
    }

    fn service_names(&self) -> Vec<String> {
        self.services
            .lock()
            .unwrap()
            .iter()
            .map(|s| s.name_any())
            .collect()
    }

    fn job_present(&self) -> bool {
        *self.job_present.lock().unwrap()
    }
}

#[async_trait]
impl JobAdapter for TestJobController {
    type Job = TestJob;

    fn job_key(&self, job: &TestJob) -> String {
        format!("default/{}", job.name)
    }

    async fn list_owned_pods(&self, _job: &TestJob) -> Result<Vec<Pod>> {
        Ok(self.pods.lock().unwrap().clone())
    }

    async fn list_owned_services(&self, _job: &TestJob) -> Result<Vec<Service>> {
        Ok(self.services.lock().unwrap().clone())
    }

    async fn delete_pod(&self, _job: &TestJob, pod: &Pod) -> Result<()> {
        self.delete_calls.fetch_add(1, Ordering::SeqCst);
        let name = pod.name_any();
        self.pods.lock().unwrap().retain(|p| p.name_any() != name);
        Ok(())
    }

    async fn delete_service(&self, _job: &TestJob, service: &Service) -> Result<()> {
        self.delete_calls.fetch_add(1, Ordering::SeqCst);
        let name = service.name_any();
        self.services.lock().unwrap().retain(|s| s.name_any() != name);
        Ok(())
    }

    async fn delete_job(&self, _job: &TestJob) -> Result<()> {
        self.delete_calls.fetch_add(1, Ordering::SeqCst);
        *self.job_present.lock().unwrap() = false;
        Ok(())
    }

    async fn update_job_status(&self, _job: &TestJob, status: &JobStatus) -> Result<()> {
        self.status_updates.lock().unwrap().push(status.clone());
        Ok(())
    }
}

fn new_pod(name: &str, phase: &str, restarts: i32) -> Pod {
    let mut labels = gen_labels("mnist");
    labels.insert(LABEL_REPLICA_TYPE.to_string(), "worker".to_string());
    labels.insert(LABEL_REPLICA_INDEX.to_string(), "0".to_string());
    Pod {
        metadata: ObjectMeta {
            name: Some(name.to_string()),
            namespace: Some("default".to_string()),
            labels: Some(labels),
            ..ObjectMeta::default()
        },
        status: Some(PodStatus {
            phase: Some(phase.to_string()),
            container_statuses: Some(vec![ContainerStatus {
                name: "tensorflow".to_string(),
                restart_count: restarts,
                ..ContainerStatus::default()
            }]),
            ..PodStatus::default()
        }),
        ..Pod::default()
    }
}

fn new_service(name: &str) -> Service {
    Service {
        metadata: ObjectMeta {
            name: Some(name.to_string()),
            namespace: Some("default".to_string()),
            ..ObjectMeta::default()
        },
        ..Service::default()
    }
}

fn worker(index: u32) -> String {
    gen_general_name("mnist", &ReplicaType::from("Worker"), index)
}

/// One running, one succeeded and one failed pod, each with its service.
fn three_phase_fixture() -> TestJobController {
    let names = [worker(0), worker(1), worker(2)];
    let pods = vec![
        new_pod(&names[0], POD_RUNNING, 0),
        new_pod(&names[1], POD_SUCCEEDED, 0),
        new_pod(&names[2], POD_FAILED, 0),
    ];
    let services = names.iter().map(|n| new_service(n)).collect();
    TestJobController::with(pods, services)
}

fn job() -> TestJob {
    TestJob {
        name: "mnist".to_string(),
    }
}

fn clean_policy(policy: CleanPodPolicy) -> RunPolicy {
    RunPolicy {
        clean_pod_policy: Some(policy),
        ..RunPolicy::default()
    }
}

#[tokio::test]
async fn cleanup_follows_policy_and_keeps_failed_pods() {
    let cases = [
        (CleanPodPolicy::Running, vec![worker(1), worker(2)]),
        (CleanPodPolicy::All, vec![worker(2)]),
        (CleanPodPolicy::None, vec![worker(0), worker(1), worker(2)]),
    ];

    for (policy, remaining) in cases {
        let adapter = three_phase_fixture();
        let pods = adapter.pod_names();
        assert_eq!(pods.len(), 3);

        let owned = adapter.pods.lock().unwrap().clone();
        delete_pods_and_services(&adapter, Some(policy), &job(), &owned)
            .await
            .unwrap();

        assert_eq!(adapter.pod_names(), remaining, "pods after {policy}");
        assert_eq!(adapter.service_names(), remaining, "services after {policy}");
    }
}

#[tokio::test]
async fn scenario_running_policy_removes_only_running_pod() {
    let adapter = TestJobController::with(
        vec![
            new_pod("runningPod", POD_RUNNING, 0),
            new_pod("succeededPod", POD_SUCCEEDED, 0),
        ],
        vec![new_service("runningPod"), new_service("succeededPod")],
    );
    let controller = JobController::new(adapter, Arc::new(ControllerConfig::default()));
    let owned = controller.adapter().pods.lock().unwrap().clone();

    controller
        .delete_pods_and_services(&clean_policy(CleanPodPolicy::Running), &job(), &owned)
        .await
        .unwrap();

    assert_eq!(controller.adapter().pod_names(), vec!["succeededPod"]);
    assert_eq!(controller.adapter().service_names(), vec!["succeededPod"]);
}

#[tokio::test]
async fn scenario_all_policy_removes_everything_settled() {
    let adapter = TestJobController::with(
        vec![
            new_pod("runningPod", POD_RUNNING, 0),
            new_pod("succeededPod", POD_SUCCEEDED, 0),
        ],
        vec![new_service("runningPod"), new_service("succeededPod")],
    );
    let owned = adapter.pods.lock().unwrap().clone();

    delete_pods_and_services(&adapter, Some(CleanPodPolicy::All), &job(), &owned)
        .await
        .unwrap();

    assert!(adapter.pod_names().is_empty());
    assert!(adapter.service_names().is_empty());
}

#[tokio::test]
async fn scenario_none_policy_removes_nothing() {
    let adapter = TestJobController::with(
        vec![
            new_pod("runningPod", POD_RUNNING, 0),
            new_pod("succeededPod", POD_SUCCEEDED, 0),
        ],
        vec![new_service("runningPod"), new_service("succeededPod")],
    );
    let owned = adapter.pods.lock().unwrap().clone();

    delete_pods_and_services(&adapter, Some(CleanPodPolicy::None), &job(), &owned)
        .await
        .unwrap();

    assert_eq!(adapter.pod_names().len(), 2);
    assert_eq!(adapter.service_names().len(), 2);
    assert_eq!(adapter.delete_calls.load(Ordering::SeqCst), 0);
}

#[test]
fn scenario_zero_backoff_limit_without_restarts() {
    let pods = vec![
        new_pod("runningPod", POD_RUNNING, 0),
        new_pod("succeededPod", POD_SUCCEEDED, 0),
    ];
    let run_policy = RunPolicy {
        backoff_limit: Some(0),
        ..RunPolicy::default()
    };
    assert!(!past_backoff_limit("fake-job", &run_policy, &ReplicaSpecs::new(), &pods).unwrap());

    let restarted = vec![new_pod("runningPod", POD_RUNNING, 1)];
    assert!(past_backoff_limit("fake-job", &run_policy, &ReplicaSpecs::new(), &restarted).unwrap());
}

#[test]
fn scenario_zero_deadline_is_past_at_start() {
    let status = JobStatus {
        start_time: Some(Time(Utc::now())),
        ..JobStatus::default()
    };
    for (seconds, expected) in [(0, true), (2, false)] {
        let run_policy = RunPolicy {
            active_deadline_seconds: Some(seconds),
            ..RunPolicy::default()
        };
        assert_eq!(
            past_active_deadline(&run_policy, &status),
            expected,
            "activeDeadlineSeconds == {seconds}"
        );
    }
}

#[tokio::test]
async fn scenario_zero_ttl_deletes_job() {
    let adapter = TestJobController::with(Vec::new(), Vec::new());
    let run_policy = RunPolicy {
        ttl_seconds_after_finished: Some(0),
        ..RunPolicy::default()
    };
    let status = JobStatus {
        completion_time: Some(Time(Utc::now())),
        ..JobStatus::default()
    };

    let outcome = cleanup_job(&adapter, &run_policy, &status, &job()).await.unwrap();
    assert_eq!(outcome, Finalization::Deleted);
    assert!(!adapter.job_present());
}

#[tokio::test]
async fn ttl_from_a_day_ago_deletes_job() {
    let adapter = TestJobController::with(Vec::new(), Vec::new());
    let run_policy = RunPolicy {
        ttl_seconds_after_finished: Some(3600),
        ..RunPolicy::default()
    };
    let status = JobStatus {
        completion_time: Some(Time(Utc::now() - ChronoDuration::days(1))),
        ..JobStatus::default()
    };

    let outcome = cleanup_job(&adapter, &run_policy, &status, &job()).await.unwrap();
    assert!(outcome.is_deleted());
}

#[tokio::test]
async fn pending_ttl_leaves_job_and_reports_remainder() {
    let adapter = TestJobController::with(Vec::new(), Vec::new());
    let run_policy = RunPolicy {
        ttl_seconds_after_finished: Some(600),
        ..RunPolicy::default()
    };
    let status = JobStatus {
        completion_time: Some(Time(Utc::now())),
        ..JobStatus::default()
    };

    let outcome = cleanup_job(&adapter, &run_policy, &status, &job()).await.unwrap();
    let remaining = outcome.requeue_after().unwrap();
    assert!(remaining <= Duration::from_secs(600));
    assert!(remaining > Duration::from_secs(590));
    assert!(adapter.job_present());
}

#[tokio::test]
async fn repeated_passes_on_a_clean_job_are_noops() {
    let adapter = three_phase_fixture();
    let controller = JobController::new(adapter, Arc::new(ControllerConfig::default()));

    let run_policy = RunPolicy {
        clean_pod_policy: Some(CleanPodPolicy::All),
        ttl_seconds_after_finished: Some(0),
        ..RunPolicy::default()
    };
    let completed = Utc::now();
    let mut job_status = JobStatus {
        completion_time: Some(Time(completed)),
        ..JobStatus::default()
    };
    status::update_job_conditions(
        &mut job_status,
        JobConditionType::Failed,
        "BackoffLimitExceeded",
        "failed",
        completed,
    );

    let first = controller
        .reconcile_lifecycle(&job(), &run_policy, &ReplicaSpecs::new(), &job_status)
        .await
        .unwrap();
    assert_eq!(first, LifecycleDecision::Finished(Finalization::Deleted));
    assert_eq!(controller.adapter().pod_names(), vec![worker(2)]);
    // two pods, two services, one job
    assert_eq!(controller.adapter().delete_calls.load(Ordering::SeqCst), 5);

    let second = controller
        .reconcile_lifecycle(&job(), &run_policy, &ReplicaSpecs::new(), &job_status)
        .await
        .unwrap();
    assert_eq!(second, LifecycleDecision::Finished(Finalization::Deleted));
    assert_eq!(controller.adapter().pod_names(), vec![worker(2)]);
    // only the idempotent job delete is repeated
    assert_eq!(controller.adapter().delete_calls.load(Ordering::SeqCst), 6);
    assert!(controller.adapter().status_updates.lock().unwrap().is_empty());
}

#[tokio::test]
async fn running_job_over_budget_is_reported_for_failure() {
    let adapter = TestJobController::with(
        vec![new_pod(&worker(0), POD_RUNNING, 4), new_pod(&worker(1), POD_RUNNING, 2)],
        Vec::new(),
    );
    let controller = JobController::new(adapter, Arc::new(ControllerConfig::default()));
    let run_policy = RunPolicy {
        backoff_limit: Some(5),
        ..RunPolicy::default()
    };
    let job_status = JobStatus {
        start_time: Some(Time(Utc::now())),
        ..JobStatus::default()
    };

    let decision = controller
        .reconcile_lifecycle(&job(), &run_policy, &ReplicaSpecs::new(), &job_status)
        .await
        .unwrap();
    match decision {
        LifecycleDecision::Fail { reason, message } => {
            assert_eq!(reason.to_string(), "BackoffLimitExceeded");
            assert!(message.contains("default/mnist"));
        }
        other => panic!("expected failure, got {other:?}"),
    }
    assert_eq!(controller.adapter().delete_calls.load(Ordering::SeqCst), 0);
}
