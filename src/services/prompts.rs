//! Instruction texts used by the convergence loop.
//!
//! The texts are data: a `PromptSet` can be replaced wholesale (tests use
//! short ones). Only the section markers they ask for are load-bearing, see
//! `services::extraction`.

use serde::{Deserialize, Serialize};

const GENERATION_PROMPT: &str = r"### Core Instructions ###

* **Rigor is paramount.** Your goal is a complete and rigorously justified solution. Every step must follow logically from the previous ones. A correct final answer reached through flawed or incomplete reasoning is a failure.
* **Be honest about completeness.** If you cannot find a complete solution, do not guess. Present only the significant partial results you can rigorously prove, and say clearly that the solution is partial.
* **Use TeX for all mathematics.** Enclose every variable, expression and relation in TeX delimiters.

### Output Format ###

Your response MUST be structured into exactly these sections, in this order.

**1. Summary**

Start with `### Summary ###` and give:
* **a. Verdict:** whether the solution is complete or partial, and the final answer or the partial results proven.
* **b. Method Sketch:** a high-level outline of the argument, with precise statements of the key lemmas.

**2. Detailed Solution**

Start with `### Detailed Solution ###` and give the full, step-by-step proof. It must contain only the argument itself, with no commentary, alternative approaches or dead ends.

### Self-Correction Instruction ###

Before finalizing, review your work against every instruction above.
";

const SELF_IMPROVEMENT_PROMPT: &str = "You have an opportunity to improve your solution. Review it carefully: correct errors, fill justification gaps, and make every step rigorous. Then present the improved solution in the required output format, starting with `### Summary ###`.";

const VERIFICATION_SYSTEM_PROMPT: &str = r"You are an expert mathematician and a meticulous grader. Your task is to verify the provided solution step by step. A solution is acceptable only if every step is rigorously justified; a correct final answer reached through flawed reasoning must be flagged.

### Instructions ###

1. Do not fix the solution. Your job is to find and report its issues.
2. Classify every issue you find:
   * **Critical Error:** a logical or calculational error that breaks the chain of reasoning. Do not check later steps that depend on it, but do check independent parts.
   * **Justification Gap:** a step that may be correct but is insufficiently argued. Assume its conclusion holds and continue checking.
3. Your response must have exactly two sections.

### Summary ###

* **Final Verdict:** one sentence stating whether the solution is valid or contains a Critical Error or Justification Gaps.
* **List of Findings:** a bulleted list of every issue, each with its location (a quote) and its classification.

### Detailed Verification Log ###

A step-by-step log of your verification, quoting the relevant text before analysing it.
";

const VERIFICATION_REMINDER: &str = r"### Verification Task Reminder ###

Generate the **summary** and the **step-by-step verification log** for the solution above. In the summary, state your final verdict and list every issue found, with its location and classification.
";

const CORRECTION_PROMPT: &str = r"Below is the bug report. If you agree with an item, improve your solution so that it is complete and rigorous. If you disagree with an item, add a detailed explanation to your solution to avoid such a misunderstanding. Your new solution must strictly follow the required output format, starting with `### Summary ###`.";

const CLASSIFICATION_QUESTION: &str = r#"Response in "yes" or "no". Is the following statement saying the solution is complete, correct, and does not contain critical error or a major justification gap?"#;

const RULE: &str = "======================================================================";

/// The fixed instruction texts of one loop.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PromptSet {
    pub generation: String,
    pub self_improvement: String,
    pub verification_system: String,
    pub verification_reminder: String,
    pub correction: String,
    pub classification: String,
}

impl Default for PromptSet {
    fn default() -> Self {
        Self {
            generation: GENERATION_PROMPT.to_string(),
            self_improvement: SELF_IMPROVEMENT_PROMPT.to_string(),
            verification_system: VERIFICATION_SYSTEM_PROMPT.to_string(),
            verification_reminder: VERIFICATION_REMINDER.to_string(),
            correction: CORRECTION_PROMPT.to_string(),
            classification: CLASSIFICATION_QUESTION.to_string(),
        }
    }
}

impl PromptSet {
    /// User turn sent to the verifier.
    pub fn verification_request(&self, problem: &str, detailed_solution: &str) -> String {
        format!(
            "\n{RULE}\n### Problem ###\n\n{problem}\n\n{RULE}\n### Solution ###\n\n{detailed_solution}\n\n{}\n",
            self.verification_reminder
        )
    }

    /// User turn of the correction step.
    pub fn correction_request(&self, feedback: &str) -> String {
        format!("{}\n\n{feedback}", self.correction)
    }

    /// The constrained yes/no question about a verifier's judgement.
    pub fn classification_request(&self, verifier_text: &str) -> String {
        format!("{}\n\n{verifier_text}", self.classification)
    }
}
