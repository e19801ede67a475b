//! Semantic validation turning raw documents into query descriptors.
//!
//! All failures of one file are collected and reported together so the
//! operator gets a tight feedback loop when configuring queries.

use std::collections::HashMap;

use tagsync_types::query::{PREVIOUS_MARKER_PARAM, SKIPPED_CODES_PARAM, SKIPPED_IDS_PARAM};
use tagsync_types::{ActivityTypeQuery, ActivityTypeStrategy, TagQuery};

use crate::config::types::{ActivityTypeQueryDoc, TagQueryDoc};
use crate::error::ConfigError;

fn non_empty(value: Option<&String>) -> Option<&str> {
    value.map(String::as_str).filter(|v| !v.trim().is_empty())
}

/// Validate tag query documents.
///
/// Every document needs a name, SQL, an initial marker and a non-empty
/// skipped-id list (a sentinel value when nothing should be skipped). No
/// two queries may share an identity.
///
/// # Errors
///
/// Returns [`ConfigError::Invalid`] listing every failure found.
pub fn validate_tag_queries(docs: Vec<TagQueryDoc>) -> Result<Vec<TagQuery>, ConfigError> {
    let mut errors = Vec::new();
    let mut queries = Vec::with_capacity(docs.len());

    for (i, doc) in docs.into_iter().enumerate() {
        let label = non_empty(doc.name.as_ref())
            .map_or_else(|| format!("#{i}"), |n| format!("'{n}'"));
        let before = errors.len();

        if non_empty(doc.name.as_ref()).is_none() {
            errors.push(format!("Tag query {label}: name is required"));
        }
        if non_empty(doc.initial_sync_marker.as_ref()).is_none() {
            errors.push(format!(
                "Tag query {label}: initialSyncMarker can't be empty"
            ));
        }
        match non_empty(doc.sql.as_ref()) {
            None => errors.push(format!("Tag query {label}: sql is required")),
            Some(sql) => {
                if !sql.contains(PREVIOUS_MARKER_PARAM) || !sql.contains(SKIPPED_IDS_PARAM) {
                    errors.push(format!(
                        "Tag query {label}: sql must reference both {PREVIOUS_MARKER_PARAM} and {SKIPPED_IDS_PARAM}"
                    ));
                }
            }
        }
        let has_skipped_id = doc
            .skipped_ids
            .as_ref()
            .is_some_and(|ids| ids.iter().any(|id| !id.trim().is_empty()));
        if !has_skipped_id {
            errors.push(format!(
                "Tag query {label}: skippedIds is required. Use a sentinel value if none apply"
            ));
        }

        if errors.len() == before {
            queries.push(
                TagQuery::new(
                    doc.name.unwrap_or_default(),
                    doc.sql.unwrap_or_default(),
                    doc.initial_sync_marker.unwrap_or_default(),
                    doc.skipped_ids.unwrap_or_default(),
                )
                .with_continuous_resync(doc.continuous_resync.unwrap_or(true)),
            );
        }
    }

    let mut seen: HashMap<_, &str> = HashMap::new();
    for query in &queries {
        if let Some(first) = seen.insert(query.identity(), &query.name) {
            errors.push(format!(
                "Tag queries must be unique: '{first}' and '{}' share sql, initialSyncMarker and skippedIds",
                query.name
            ));
        }
    }

    if errors.is_empty() {
        Ok(queries)
    } else {
        Err(ConfigError::Invalid(errors))
    }
}

/// Validate activity-type query documents.
///
/// At most one query may be configured. The `:skipped_codes` placeholder
/// and the `skippedCodes` list go together, as do the `sync_marker`
/// column, the `:previous_sync_marker` placeholder and `initialSyncMarker`.
///
/// # Errors
///
/// Returns [`ConfigError::Invalid`] listing every failure found.
pub fn validate_activity_type_queries(
    docs: Vec<ActivityTypeQueryDoc>,
) -> Result<Vec<ActivityTypeQuery>, ConfigError> {
    let mut errors = Vec::new();

    if docs.len() > 1 {
        errors.push(format!(
            "At most one activity type query may be configured, found {}",
            docs.len()
        ));
    }

    let mut queries = Vec::with_capacity(docs.len());
    for (i, doc) in docs.into_iter().enumerate() {
        let before = errors.len();
        let Some(sql) = non_empty(doc.sql.as_ref()).map(str::trim) else {
            errors.push(format!("Activity type query #{i}: sql is required"));
            continue;
        };

        let skipped_codes = doc.skipped_codes.clone().unwrap_or_default();
        let initial_marker = doc
            .initial_sync_marker
            .clone()
            .filter(|m| !m.trim().is_empty());
        let query = ActivityTypeQuery::new(sql, initial_marker, skipped_codes);
        let caps = query.capabilities();

        if caps.skipped_codes_param && query.skipped_codes().is_empty() {
            errors.push(format!(
                "Activity type query #{i}: skippedCodes is required when sql references {SKIPPED_CODES_PARAM}"
            ));
        }
        if !caps.skipped_codes_param && !query.skipped_codes().is_empty() {
            errors.push(format!(
                "Activity type query #{i}: sql must reference {SKIPPED_CODES_PARAM} to skip the configured codes"
            ));
        }
        if caps.marker_column != caps.previous_marker_param {
            errors.push(format!(
                "Activity type query #{i}: the sync_marker column and {PREVIOUS_MARKER_PARAM} must be used together"
            ));
        }
        let uses_marker = query.strategy() == ActivityTypeStrategy::Marker;
        if uses_marker && !query.has_initial_sync_marker() {
            errors.push(format!(
                "Activity type query #{i}: initialSyncMarker is required for a sync_marker query"
            ));
        }
        if !uses_marker && query.has_initial_sync_marker() {
            errors.push(format!(
                "Activity type query #{i}: initialSyncMarker requires a sync_marker column and {PREVIOUS_MARKER_PARAM}"
            ));
        }

        if errors.len() == before {
            queries.push(query);
        }
    }

    if errors.is_empty() {
        Ok(queries)
    } else {
        Err(ConfigError::Invalid(errors))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const TAG_SQL: &str =
        "SELECT id, tag_name, keyword, description, marker AS sync_marker FROM cases \
         WHERE marker >= :previous_sync_marker AND id NOT IN (:skipped_ids) ORDER BY marker";

    fn tag_doc(name: &str) -> TagQueryDoc {
        TagQueryDoc {
            name: Some(name.into()),
            sql: Some(format!("  {TAG_SQL}\n")),
            initial_sync_marker: Some("0".into()),
            skipped_ids: Some(vec!["NONE".into()]),
            continuous_resync: None,
        }
    }

    fn errors_of(result: Result<Vec<impl std::fmt::Debug>, ConfigError>) -> Vec<String> {
        match result.unwrap_err() {
            ConfigError::Invalid(errors) => errors,
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn valid_tag_query_keeps_sql_verbatim_and_defaults_resync() {
        let queries = validate_tag_queries(vec![tag_doc("cases")]).unwrap();
        assert_eq!(queries.len(), 1);
        assert_eq!(queries[0].sql, format!("  {TAG_SQL}\n"));
        assert!(queries[0].continuous_resync);
    }

    #[test]
    fn whitespace_edit_to_tag_sql_is_a_new_query() {
        let mut bare = tag_doc("bare");
        bare.sql = Some(TAG_SQL.into());
        let mut padded = tag_doc("padded");
        padded.sql = Some(format!("{TAG_SQL}\n"));

        let queries = validate_tag_queries(vec![bare, padded]).unwrap();
        assert_eq!(queries.len(), 2);
        assert_ne!(queries[0].identity(), queries[1].identity());
    }

    #[test]
    fn tag_query_without_initial_marker_fails() {
        let mut doc = tag_doc("cases");
        doc.initial_sync_marker = None;
        let errors = errors_of(validate_tag_queries(vec![doc]));
        assert_eq!(errors.len(), 1);
        assert!(errors[0].contains("initialSyncMarker"));
    }

    #[test]
    fn tag_query_reports_every_missing_field() {
        let errors = errors_of(validate_tag_queries(vec![TagQueryDoc::default()]));
        assert_eq!(errors.len(), 4, "{errors:?}");
        assert!(errors.iter().any(|e| e.contains("name is required")));
        assert!(errors.iter().any(|e| e.contains("sql is required")));
        assert!(errors.iter().any(|e| e.contains("sentinel")));
    }

    #[test]
    fn tag_query_with_empty_skipped_ids_fails() {
        let mut doc = tag_doc("cases");
        doc.skipped_ids = Some(vec![]);
        let errors = errors_of(validate_tag_queries(vec![doc]));
        assert!(errors[0].contains("skippedIds"));
    }

    #[test]
    fn tag_query_with_only_blank_skipped_ids_fails() {
        let mut doc = tag_doc("cases");
        doc.skipped_ids = Some(vec![String::new(), "  ".into()]);
        let errors = errors_of(validate_tag_queries(vec![doc]));
        assert_eq!(errors.len(), 1);
        assert!(errors[0].contains("sentinel"));
    }

    #[test]
    fn tag_query_without_placeholders_fails() {
        let mut doc = tag_doc("cases");
        doc.sql = Some("SELECT * FROM cases".into());
        let errors = errors_of(validate_tag_queries(vec![doc]));
        assert!(errors[0].contains(":previous_sync_marker"));
    }

    #[test]
    fn duplicate_tag_identities_fail_even_with_different_names() {
        let mut second = tag_doc("other");
        second.continuous_resync = Some(false);
        let errors = errors_of(validate_tag_queries(vec![tag_doc("cases"), second]));
        assert_eq!(errors.len(), 1);
        assert!(errors[0].contains("must be unique"));
        assert!(errors[0].contains("'cases'") && errors[0].contains("'other'"));
    }

    #[test]
    fn distinct_markers_are_distinct_queries() {
        let mut second = tag_doc("other");
        second.initial_sync_marker = Some("100".into());
        let queries = validate_tag_queries(vec![tag_doc("cases"), second]).unwrap();
        assert_eq!(queries.len(), 2);
    }

    fn activity_doc(sql: &str) -> ActivityTypeQueryDoc {
        ActivityTypeQueryDoc {
            sql: Some(sql.into()),
            ..ActivityTypeQueryDoc::default()
        }
    }

    #[test]
    fn hash_activity_type_query_is_valid() {
        let queries =
            validate_activity_type_queries(vec![activity_doc("SELECT code, label, description FROM at")])
                .unwrap();
        assert_eq!(queries[0].strategy(), ActivityTypeStrategy::Hash);
    }

    #[test]
    fn marker_activity_type_query_needs_initial_marker() {
        let sql = "SELECT code, label, description, ts AS sync_marker FROM at \
                   WHERE ts >= :previous_sync_marker ORDER BY ts";
        let errors = errors_of(validate_activity_type_queries(vec![activity_doc(sql)]));
        assert!(errors[0].contains("initialSyncMarker is required"));

        let mut doc = activity_doc(sql);
        doc.initial_sync_marker = Some("0".into());
        let queries = validate_activity_type_queries(vec![doc]).unwrap();
        assert_eq!(queries[0].strategy(), ActivityTypeStrategy::Marker);
    }

    #[test]
    fn initial_marker_without_marker_sql_fails() {
        let mut doc = activity_doc("SELECT code, label, description FROM at");
        doc.initial_sync_marker = Some("0".into());
        let errors = errors_of(validate_activity_type_queries(vec![doc]));
        assert!(errors[0].contains("requires a sync_marker column"));
    }

    #[test]
    fn marker_column_without_placeholder_fails() {
        let doc = activity_doc("SELECT code, label, description, ts AS sync_marker FROM at");
        let errors = errors_of(validate_activity_type_queries(vec![doc]));
        assert!(errors.iter().any(|e| e.contains("must be used together")));
    }

    #[test]
    fn skipped_codes_placeholder_requires_list() {
        let doc =
            activity_doc("SELECT code, label, description FROM at WHERE code NOT IN (:skipped_codes)");
        let errors = errors_of(validate_activity_type_queries(vec![doc]));
        assert!(errors[0].contains("skippedCodes is required"));
    }

    #[test]
    fn skipped_codes_list_requires_placeholder() {
        let mut doc = activity_doc("SELECT code, label, description FROM at");
        doc.skipped_codes = Some(vec!["X".into()]);
        let errors = errors_of(validate_activity_type_queries(vec![doc]));
        assert!(errors[0].contains("must reference :skipped_codes"));
    }

    #[test]
    fn more_than_one_activity_type_query_fails() {
        let sql = "SELECT code, label, description FROM at";
        let errors = errors_of(validate_activity_type_queries(vec![
            activity_doc(sql),
            activity_doc(sql),
        ]));
        assert!(errors[0].contains("At most one"));
    }

    #[test]
    fn no_activity_type_queries_is_valid() {
        assert!(validate_activity_type_queries(vec![]).unwrap().is_empty());
    }
}
