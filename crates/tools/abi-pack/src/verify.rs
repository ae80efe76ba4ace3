//! Verification reports for manifest documents.

use crate::doc::{DocError, ManifestDoc};

/// Result of manifest document verification.
#[derive(Debug)]
pub struct VerificationReport {
    /// Errors found during verification.
    pub errors: Vec<String>,
    /// Non-fatal issues worth a look.
    pub warnings: Vec<String>,
    /// Whether all critical checks passed.
    pub passed: bool,
    /// The pinned manifest hash, when verification passed.
    pub manifest_hash: Option<String>,
}

impl VerificationReport {
    fn new() -> Self {
        Self {
            errors: Vec::new(),
            warnings: Vec::new(),
            passed: true,
            manifest_hash: None,
        }
    }

    fn add_error(&mut self, error: String) {
        self.errors.push(error);
        self.passed = false;
    }

    fn add_warning(&mut self, warning: String) {
        self.warnings.push(warning);
    }
}

impl std::fmt::Display for VerificationReport {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        if self.passed {
            writeln!(f, "Verification PASSED")?;
        } else {
            writeln!(f, "Verification FAILED")?;
        }

        if let Some(hash) = &self.manifest_hash {
            writeln!(f, "abi_manifest_hash: {}", hash)?;
        }

        if !self.errors.is_empty() {
            writeln!(f, "\nErrors:")?;
            for (i, error) in self.errors.iter().enumerate() {
                writeln!(f, "  {}. {}", i + 1, error)?;
            }
        }

        if !self.warnings.is_empty() {
            writeln!(f, "\nWarnings:")?;
            for (i, warning) in self.warnings.iter().enumerate() {
                writeln!(f, "  {}. {}", i + 1, warning)?;
            }
        }

        Ok(())
    }
}

/// Verifies a manifest document: structural conversion, the full protocol
/// validation rule set, and canonical hashing.
pub fn verify_manifest_doc(doc: &ManifestDoc) -> VerificationReport {
    let mut report = VerificationReport::new();

    for function in &doc.functions {
        if function.gas.k_units > 0 && function.limits.max_units == 0 {
            report.add_warning(format!(
                "fn {}: k_units is set but max_units is 0; the coefficient is dead",
                function.fn_id
            ));
        }
        let has_string_arg = function.arg_schema.iter().any(|s| s == "string");
        if has_string_arg && function.limits.arg_utf8_max.is_none() {
            report.add_warning(format!(
                "fn {}: string arguments without arg_utf8_max rely on max_request_bytes alone",
                function.fn_id
            ));
        }
    }

    match doc.clone().into_manifest() {
        Ok(manifest) => match manifest.manifest_hash() {
            Ok(hash) => report.manifest_hash = Some(hash),
            Err(e) => report.add_error(format!("canonical encoding failed: {}", e)),
        },
        Err(DocError::Manifest(e)) => report.add_error(format!("validation failed: {}", e)),
        Err(e) => report.add_error(e.to_string()),
    }

    report
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::doc::ErrorCodeDoc;

    #[test]
    fn test_template_passes() {
        let report = verify_manifest_doc(&ManifestDoc::template("workflow.host".to_string()));
        assert!(report.passed, "{report}");
        assert!(report.manifest_hash.is_some());
    }

    #[test]
    fn test_reserved_code_fails() {
        let mut doc = ManifestDoc::template("workflow.host".to_string());
        doc.functions[0].error_codes = vec![ErrorCodeDoc {
            code: "HOST_ENVELOPE_INVALID".to_string(),
            tag: "host/envelope_invalid".to_string(),
        }];
        let report = verify_manifest_doc(&doc);
        assert!(!report.passed);
        assert!(report.manifest_hash.is_none());
    }

    #[test]
    fn test_dead_coefficient_warns() {
        let mut doc = ManifestDoc::template("workflow.host".to_string());
        doc.functions[0].limits.max_units = 0;
        let report = verify_manifest_doc(&doc);
        assert!(report.passed);
        assert_eq!(report.warnings.len(), 1);
    }
}
