//! Schema builder: every question's variables, in question and group order.

use survey_model::{Schema, SurveyMetadata};

use crate::error::InferenceError;
use crate::inference::infer_question;
use crate::naming::{NamingContext, PinnedNames, VariableNamer};

/// Build the survey schema from parsed metadata.
///
/// Fails on the first structural error; nothing is returned for the
/// questions that did infer.
pub fn build_schema(
    metadata: &SurveyMetadata,
    namer: &dyn VariableNamer,
    pinned: &PinnedNames,
) -> Result<Schema, InferenceError> {
    let mut naming = NamingContext::new(namer, pinned);
    let mut variables = Vec::with_capacity(metadata.varname_count());
    for question in &metadata.questions {
        variables.extend(infer_question(question, &mut naming)?);
    }
    let schema = Schema::new(variables)?;
    tracing::info!(
        questions = metadata.questions.len(),
        variables = schema.len(),
        pinned = pinned.len(),
        "built schema"
    );
    Ok(schema)
}
