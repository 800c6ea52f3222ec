use std::collections::BTreeSet;
use std::sync::Arc;

use clusterprobe::config::DetectorConfig;
use clusterprobe::exec::ScriptedRunner;
use clusterprobe::rbac::{Capabilities, Capability, RbacEnforcer};
use clusterprobe::types::RbacInfo;
use clusterprobe::utils::MemoryLogger;

const WHOAMI: &str = "kubectl config view --minify -o jsonpath={.contexts[0].context.user}";

const BINDINGS: &str = r#"{
  "apiVersion": "v1",
  "kind": "List",
  "items": [
    {
      "kind": "RoleBinding",
      "metadata": {"name": "dev-deployer", "namespace": "shop"},
      "roleRef": {"apiGroup": "rbac.authorization.k8s.io", "kind": "Role", "name": "deployer"},
      "subjects": [
        {"kind": "User", "name": "dev@example.com"},
        {"kind": "ServiceAccount", "name": "ci", "namespace": "shop"}
      ]
    }
  ]
}"#;

const CLUSTER_BINDINGS: &str = r#"{
  "items": [
    {
      "kind": "ClusterRoleBinding",
      "metadata": {"name": "everyone-views"},
      "roleRef": {"kind": "ClusterRole", "name": "view"},
      "subjects": [{"kind": "Group", "name": "dev@example.com"}]
    }
  ]
}"#;

const DEPLOYER: &str = r#"{
  "kind": "Role",
  "rules": [
    {"apiGroups": ["apps"], "resources": ["deployments"], "verbs": ["create", "update", "patch", "delete"]},
    {"apiGroups": [""], "resources": ["pods/exec"], "verbs": ["create"]}
  ]
}"#;

const VIEW: &str = r#"{
  "kind": "ClusterRole",
  "rules": [
    {"apiGroups": [""], "resources": ["pods", "services"], "verbs": ["get", "list", "watch"]}
  ]
}"#;

fn cluster(user: &str) -> ScriptedRunner {
    ScriptedRunner::new()
        .with_tool("kubectl")
        .respond(WHOAMI, user)
        .respond("kubectl get rolebindings -n shop -o json", BINDINGS)
        .respond("kubectl get clusterrolebindings -o json", CLUSTER_BINDINGS)
        .respond("kubectl get role deployer -n shop -o json", DEPLOYER)
        .respond("kubectl get clusterrole view -o json", VIEW)
}

fn enforcer(runner: ScriptedRunner) -> RbacEnforcer {
    RbacEnforcer::new(
        Arc::new(runner),
        Arc::new(DetectorConfig::default()),
        Arc::new(MemoryLogger::new()),
    )
}

#[tokio::test]
async fn bindings_union_into_capabilities() {
    let info = enforcer(cluster("dev@example.com"))
        .check_user_permissions("shop")
        .await;

    assert_eq!(info.user, "dev@example.com");
    assert_eq!(info.roles, vec!["deployer".to_string(), "cluster:view".to_string()]);
    assert!(info.can_read && info.can_write && info.can_delete && info.can_exec);
    assert!(info.permissions.contains("watch services"));
    assert!(info.permissions.contains("create pods/exec"));
}

#[tokio::test]
async fn service_account_identity_matches_binding() {
    let info = enforcer(cluster("system:serviceaccount:shop:ci"))
        .check_user_permissions("shop")
        .await;

    assert_eq!(info.roles, vec!["deployer".to_string()]);
    assert!(!info.can_read);
    assert!(info.can_write);
}

#[tokio::test]
async fn unbound_identity_has_nothing() {
    let info = enforcer(cluster("mallory"))
        .check_user_permissions("shop")
        .await;

    assert_eq!(info, RbacInfo::empty("mallory", "shop"));
}

#[tokio::test]
async fn permission_set_is_stable_across_calls() {
    let enforcer = enforcer(cluster("dev@example.com"));

    let first = enforcer.check_user_permissions("shop").await;
    let second = enforcer.check_user_permissions("shop").await;

    assert_eq!(first.permissions, second.permissions);
    let first_roles: BTreeSet<_> = first.roles.iter().collect();
    let second_roles: BTreeSet<_> = second.roles.iter().collect();
    assert_eq!(first_roles, second_roles);
}

#[test]
fn dropping_any_verb_drops_the_capability() {
    for capability in Capability::ALL {
        let resource = match capability {
            Capability::Exec => "pods/exec",
            _ => "pods",
        };
        let full: BTreeSet<String> = capability
            .verbs()
            .iter()
            .map(|verb| format!("{} {}", verb, resource))
            .collect();
        assert!(capability.is_covered_by(&full), "{:?}", capability);

        for removed in &full {
            let mut reduced = full.clone();
            reduced.remove(removed);
            assert!(
                !capability.is_covered_by(&reduced),
                "{:?} without {}",
                capability,
                removed
            );
        }
    }
}

#[tokio::test]
async fn server_deny_wins_over_aggregated_grant() {
    let runner = cluster("dev@example.com").fail_with_stdout(
        "kubectl auth can-i delete deployments -n shop",
        1,
        "no\n",
    );
    let enforcer = enforcer(runner);

    let aggregated = enforcer.check_user_permissions("shop").await;
    let check = enforcer
        .check_resource_permission("deployments", "delete", "shop")
        .await;

    assert!(aggregated.permissions.contains("delete deployments"));
    assert!(!check.allowed);
    assert!(check.reason.contains("dev@example.com"));
    assert!(check.user_permissions.contains(&"delete deployments".to_string()));
}

#[tokio::test]
async fn server_allow_wins_over_empty_aggregate() {
    let runner = ScriptedRunner::new()
        .with_tool("kubectl")
        .respond(WHOAMI, "oidc:alice")
        .fail("kubectl get rolebindings -n shop -o json", 1, "forbidden")
        .fail("kubectl get clusterrolebindings -o json", 1, "forbidden")
        .respond("kubectl auth can-i list pods -n shop", "yes\n");

    let check = enforcer(runner)
        .check_resource_permission("pods", "list", "shop")
        .await;

    assert!(check.allowed);
    assert!(check.user_permissions.is_empty());
    assert_eq!(check.required_permissions, vec!["list pods".to_string()]);
}

#[tokio::test]
async fn namespace_summary_serializes() {
    let summary = enforcer(cluster("dev@example.com"))
        .get_namespace_permissions("shop")
        .await;

    let json = serde_json::to_value(&summary).unwrap();
    assert_eq!(json["namespace"], "shop");
    assert_eq!(json["capabilities"]["read"], true);
    assert_eq!(json["roles"][1], "cluster:view");
    assert_eq!(
        summary.capabilities,
        Capabilities {
            read: true,
            write: true,
            delete: true,
            exec: true
        }
    );
}
