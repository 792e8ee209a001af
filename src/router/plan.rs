//! Routing plans: the router's untrusted model output, parsed and validated.

use serde::{Deserialize, Serialize};

use crate::llm::extract_json_object;

/// Reason attached to the single assignment of a fallback plan.
pub const FALLBACK_REASON: &str = "Routing plan could not be understood; sent to the default worker.";
/// Summary of a fallback plan.
pub const FALLBACK_SUMMARY: &str = "Handing this to the default worker.";

/// One unit of work for one worker.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Assignment {
    pub worker_id: String,
    pub task: String,
    pub reason: String,
}

/// The router's dispatch decision.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RoutingPlan {
    pub needs_clarification: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub clarification_question: Option<String>,
    pub parallel: bool,
    pub assignments: Vec<Assignment>,
    pub summary: String,
}

/// Why a model reply was rejected as a plan.
#[derive(Debug, thiserror::Error)]
pub enum PlanError {
    #[error("plan is not valid JSON for the schema: {0}")]
    Parse(#[from] serde_json::Error),

    #[error("plan failed validation: {0}")]
    Invalid(String),
}

impl RoutingPlan {
    /// Parse a model reply (optionally fenced in markdown) and validate it.
    pub fn parse(reply: &str) -> Result<Self, PlanError> {
        let plan: RoutingPlan = serde_json::from_str(extract_json_object(reply))?;
        plan.validate()?;
        Ok(plan)
    }

    /// Structural checks serde cannot express.
    ///
    /// Unknown worker ids are not rejected here; dispatch handles them per
    /// assignment.
    pub fn validate(&self) -> Result<(), PlanError> {
        if self.needs_clarification {
            let asked = self
                .clarification_question
                .as_deref()
                .is_some_and(|q| !q.trim().is_empty());
            if !asked {
                return Err(PlanError::Invalid(
                    "needsClarification is set but clarificationQuestion is empty".into(),
                ));
            }
            return Ok(());
        }

        if self.assignments.is_empty() {
            return Err(PlanError::Invalid("no assignments".into()));
        }
        for (i, a) in self.assignments.iter().enumerate() {
            if a.worker_id.trim().is_empty() {
                return Err(PlanError::Invalid(format!("assignment {i} has no workerId")));
            }
            if a.task.trim().is_empty() {
                return Err(PlanError::Invalid(format!("assignment {i} has no task")));
            }
        }
        Ok(())
    }

    /// Single sequential assignment of the whole task to `worker_id`.
    pub fn fallback(task: &str, worker_id: &str) -> Self {
        Self {
            needs_clarification: false,
            clarification_question: None,
            parallel: false,
            assignments: vec![Assignment {
                worker_id: worker_id.to_string(),
                task: task.to_string(),
                reason: FALLBACK_REASON.to_string(),
            }],
            summary: FALLBACK_SUMMARY.to_string(),
        }
    }

    /// Parallel dispatch only pays off with more than one assignment.
    pub fn runs_in_parallel(&self) -> bool {
        self.parallel && self.assignments.len() > 1
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_fenced_plan() {
        let reply = r#"Sure, here's the plan:
```json
{
  "needsClarification": false,
  "parallel": true,
  "assignments": [
    {"workerId": "researcher", "task": "find sources", "reason": "research"},
    {"workerId": "writer", "task": "draft intro", "reason": "writing"}
  ],
  "summary": "Split research and writing."
}
```"#;
        let plan = RoutingPlan::parse(reply).unwrap();
        assert_eq!(plan.assignments.len(), 2);
        assert_eq!(plan.assignments[1].worker_id, "writer");
        assert!(plan.runs_in_parallel());
    }

    #[test]
    fn single_assignment_is_sequential_even_if_flagged_parallel() {
        let plan = RoutingPlan::parse(
            r#"{"needsClarification":false,"parallel":true,
                "assignments":[{"workerId":"writer","task":"t","reason":"r"}],
                "summary":"s"}"#,
        )
        .unwrap();
        assert!(!plan.runs_in_parallel());
    }

    #[test]
    fn rejects_missing_fields_and_wrong_types() {
        assert!(matches!(
            RoutingPlan::parse(r#"{"parallel": false, "assignments": [], "summary": "x"}"#),
            Err(PlanError::Parse(_))
        ));
        assert!(matches!(
            RoutingPlan::parse(
                r#"{"needsClarification":"no","parallel":false,"assignments":[],"summary":"x"}"#
            ),
            Err(PlanError::Parse(_))
        ));
        assert!(RoutingPlan::parse("I think Jim should do it").is_err());
    }

    #[test]
    fn rejects_empty_assignments_and_blank_tasks() {
        assert!(matches!(
            RoutingPlan::parse(
                r#"{"needsClarification":false,"parallel":false,"assignments":[],"summary":"x"}"#
            ),
            Err(PlanError::Invalid(_))
        ));
        assert!(matches!(
            RoutingPlan::parse(
                r#"{"needsClarification":false,"parallel":false,
                    "assignments":[{"workerId":"writer","task":"  ","reason":""}],"summary":"x"}"#
            ),
            Err(PlanError::Invalid(_))
        ));
    }

    #[test]
    fn clarification_requires_a_question() {
        let ok = RoutingPlan::parse(
            r#"{"needsClarification":true,"clarificationQuestion":"Which report?",
                "parallel":false,"assignments":[],"summary":"need more"}"#,
        )
        .unwrap();
        assert_eq!(ok.clarification_question.as_deref(), Some("Which report?"));

        assert!(
            RoutingPlan::parse(
                r#"{"needsClarification":true,"parallel":false,"assignments":[],"summary":"?"}"#
            )
            .is_err()
        );
    }

    #[test]
    fn unknown_worker_ids_pass_validation() {
        let plan = RoutingPlan::parse(
            r#"{"needsClarification":false,"parallel":false,
                "assignments":[{"workerId":"intern","task":"coffee","reason":"why not"}],
                "summary":"s"}"#,
        )
        .unwrap();
        assert_eq!(plan.assignments[0].worker_id, "intern");
    }

    #[test]
    fn fallback_shape() {
        let plan = RoutingPlan::fallback("do the thing", "researcher");
        assert!(!plan.needs_clarification);
        assert!(!plan.parallel);
        assert_eq!(plan.assignments.len(), 1);
        assert_eq!(plan.assignments[0].task, "do the thing");
        assert_eq!(plan.assignments[0].reason, FALLBACK_REASON);
        plan.validate().unwrap();

        let json = serde_json::to_value(&plan).unwrap();
        assert_eq!(json["assignments"][0]["workerId"], "researcher");
        assert!(json.get("clarificationQuestion").is_none());
    }
}
