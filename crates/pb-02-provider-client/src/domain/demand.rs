//! # Demand and Offer Records
//!
//! Ephemeral negotiation records. A demand lives only for the duration of
//! one negotiation attempt and is never persisted.

use serde::{Deserialize, Serialize};
use serde_json::{json, Map, Value};
use shared_types::JobSpec;

/// Offer property carrying the provider's self-reported region.
pub const REGION_PROPERTY: &str = "golem.node.geo.region";

/// Demand description posted to the marketplace.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DemandSpec {
    /// Constraint expression in the marketplace's filter syntax.
    pub constraints: String,
    /// Property bag describing the requested work.
    pub properties: Map<String, Value>,
}

impl DemandSpec {
    /// Demand for running `spec` in `region`.
    pub fn for_job(spec: &JobSpec, region: &str) -> Self {
        let resources = &spec.benchmark.resources;
        let mut clauses = vec![format!("({}={})", REGION_PROPERTY, region)];
        if resources.cpu > 0 {
            clauses.push(format!("(golem.inf.cpu.threads>={})", resources.cpu));
        }
        if resources.memory_mb > 0 {
            let gib = resources.memory_mb as f64 / 1024.0;
            clauses.push(format!("(golem.inf.mem.gib>={gib})"));
        }
        if resources.gpu {
            clauses.push("(golem.inf.gpu.present=true)".to_string());
        }

        let mut properties = Map::new();
        properties.insert("beacon.job.id".into(), json!(spec.id));
        properties.insert("beacon.job.region".into(), json!(region));
        properties.insert(
            "golem.srv.comp.task_package".into(),
            json!(spec.benchmark.container.reference()),
        );
        properties.insert(
            "golem.srv.comp.expiration".into(),
            json!(spec.constraints.provider_timeout().as_millis() as u64),
        );

        Self {
            constraints: format!("(&{})", clauses.join("")),
            properties,
        }
    }
}

/// Result of service discovery.
#[derive(Debug, Clone, PartialEq)]
pub struct ProbeResult {
    /// The path prefix that answered 200.
    pub matched_path: String,
    /// Parsed response body, when it was JSON.
    pub version_info: Option<Value>,
}

/// A provider's proposal in response to a demand.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProviderOffer {
    pub proposal_id: String,
    #[serde(default)]
    pub issuer_id: String,
    #[serde(default)]
    pub properties: Map<String, Value>,
}

impl ProviderOffer {
    /// Region the provider reports for itself, if any.
    pub fn region(&self) -> Option<&str> {
        self.properties.get(REGION_PROPERTY).and_then(Value::as_str)
    }
}

/// Events returned when polling a demand.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "eventType")]
pub enum DemandEvent {
    #[serde(rename = "ProposalEvent")]
    Proposal { proposal: ProviderOffer },
    #[serde(rename = "ProposalRejectedEvent")]
    Rejected {
        #[serde(default)]
        reason: String,
    },
    #[serde(other)]
    Other,
}

/// Everything needed to follow a job running at one provider.
#[derive(Debug, Clone, PartialEq)]
pub struct ExecutionHandle {
    pub region: String,
    pub demand_id: String,
    pub offer: ProviderOffer,
    pub agreement_id: String,
    pub activity_id: String,
}

/// Result of running the job's command batch on an activity.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExecOutcome {
    pub success: bool,
    pub stdout: String,
    pub stderr: String,
}

#[cfg(test)]
mod tests {
    use super::*;
    use shared_types::{BenchmarkSpec, ContainerSpec, ExecutionConstraints, ResourceRequests};

    #[test]
    fn test_demand_for_job() {
        let spec = JobSpec::new(
            "job-1",
            BenchmarkSpec {
                name: "b".into(),
                container: ContainerSpec {
                    image: "beacon/bench".into(),
                    tag: Some("1".into()),
                },
                resources: ResourceRequests {
                    cpu: 4,
                    memory_mb: 2048,
                    gpu: false,
                },
            },
            ExecutionConstraints::for_regions(["US"]),
        );
        let demand = DemandSpec::for_job(&spec, "US");

        assert!(demand.constraints.starts_with("(&(golem.node.geo.region=US)"));
        assert!(demand.constraints.contains("(golem.inf.cpu.threads>=4)"));
        assert!(demand.constraints.contains("(golem.inf.mem.gib>=2)"));
        assert_eq!(demand.properties["beacon.job.id"], "job-1");
        assert_eq!(demand.properties["golem.srv.comp.task_package"], "beacon/bench:1");
    }

    #[test]
    fn test_event_decoding() {
        let events: Vec<DemandEvent> = serde_json::from_value(json!([
            {"eventType": "ProposalEvent", "proposal": {
                "proposalId": "p-1", "issuerId": "node-7",
                "properties": {"golem.node.geo.region": "EU"}
            }},
            {"eventType": "ProposalRejectedEvent", "reason": "busy"},
            {"eventType": "PropertyQueryEvent"}
        ]))
        .unwrap();

        match &events[0] {
            DemandEvent::Proposal { proposal } => {
                assert_eq!(proposal.proposal_id, "p-1");
                assert_eq!(proposal.region(), Some("EU"));
            }
            other => panic!("unexpected {other:?}"),
        }
        assert_eq!(events[1], DemandEvent::Rejected { reason: "busy".into() });
        assert_eq!(events[2], DemandEvent::Other);
    }
}
