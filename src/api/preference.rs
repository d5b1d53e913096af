use std::sync::Mutex;

use async_graphql::{Context, Object, Result, SimpleObject};

use crate::{
    api::lock,
    preferences::{ColumnSettings, Favorites, Selection},
};

/// Columns shown before the user picks any.
pub(super) const DEFAULT_COLUMNS: [&str; 8] = [
    "trial_id",
    "title",
    "therapeutic_area",
    "disease_type",
    "primary_drugs",
    "trial_phase",
    "status",
    "sponsor_collaborators",
];

#[derive(SimpleObject)]
struct ColumnNode {
    column: String,
    visible: bool,
}

#[derive(SimpleObject)]
struct SelectionNode {
    trial_ids: Vec<String>,
    /// The selection as one comma-separated parameter.
    param: String,
}

fn column_nodes(columns: &ColumnSettings) -> Vec<ColumnNode> {
    columns
        .columns()
        .iter()
        .map(|(column, visible)| ColumnNode {
            column: column.clone(),
            visible: *visible,
        })
        .collect()
}

fn selection_node(selection: &Selection) -> SelectionNode {
    SelectionNode {
        trial_ids: selection.ids().map(str::to_string).collect(),
        param: selection.to_param(),
    }
}

#[derive(Default)]
pub(super) struct PreferenceQuery {}

#[Object]
impl PreferenceQuery {
    async fn favorites(&self, ctx: &Context<'_>) -> Result<Vec<String>> {
        let favorites = lock(ctx.data::<Mutex<Favorites>>()?)?;
        Ok(favorites.ids().map(str::to_string).collect())
    }

    async fn column_settings(&self, ctx: &Context<'_>) -> Result<Vec<ColumnNode>> {
        let columns = lock(ctx.data::<Mutex<ColumnSettings>>()?)?;
        Ok(column_nodes(&columns))
    }

    async fn selection(&self, ctx: &Context<'_>) -> Result<SelectionNode> {
        let selection = lock(ctx.data::<Mutex<Selection>>()?)?;
        Ok(selection_node(&selection))
    }
}

#[derive(Default)]
pub(super) struct PreferenceMutation {}

#[Object]
impl PreferenceMutation {
    /// Flips the favorite flag of a trial and returns the new flag.
    async fn toggle_favorite(&self, ctx: &Context<'_>, trial_id: String) -> Result<bool> {
        let mut favorites = lock(ctx.data::<Mutex<Favorites>>()?)?;
        Ok(favorites.toggle(&trial_id))
    }

    /// Fails without changing anything if the change would leave no column
    /// or too many columns visible.
    async fn set_column_visibility(
        &self,
        ctx: &Context<'_>,
        column: String,
        visible: bool,
    ) -> Result<Vec<ColumnNode>> {
        let mut columns = lock(ctx.data::<Mutex<ColumnSettings>>()?)?;
        columns.set_visible(&column, visible)?;
        Ok(column_nodes(&columns))
    }

    async fn reset_column_settings(&self, ctx: &Context<'_>) -> Result<Vec<ColumnNode>> {
        let mut columns = lock(ctx.data::<Mutex<ColumnSettings>>()?)?;
        columns.reset(&DEFAULT_COLUMNS);
        Ok(column_nodes(&columns))
    }

    async fn toggle_selection(&self, ctx: &Context<'_>, trial_id: String) -> Result<SelectionNode> {
        let mut selection = lock(ctx.data::<Mutex<Selection>>()?)?;
        selection.toggle(&trial_id);
        Ok(selection_node(&selection))
    }

    async fn clear_selection(&self, ctx: &Context<'_>) -> Result<SelectionNode> {
        let mut selection = lock(ctx.data::<Mutex<Selection>>()?)?;
        selection.clear();
        Ok(selection_node(&selection))
    }
}

#[cfg(test)]
mod tests {
    use crate::{
        api::TestSchema,
        database::{keys, Trial},
        preferences::MAX_VISIBLE_COLUMNS,
    };

    #[tokio::test]
    async fn favorites_are_persisted_and_flagged() {
        let schema = TestSchema::new();
        schema.seed(&[Trial {
            trial_id: "T-1".to_string(),
            ..Default::default()
        }]);

        let data = schema
            .execute(r#"mutation { toggleFavorite(trialId: "T-1") }"#)
            .await
            .data
            .into_json()
            .unwrap();
        assert_eq!(data["toggleFavorite"], true);

        let stored: Vec<String> = schema.db.get(keys::FAVORITE_TRIALS).unwrap().unwrap();
        assert_eq!(stored, vec!["T-1"]);

        let data = schema
            .execute("{ favorites trials { nodes { favorite } } }")
            .await
            .data
            .into_json()
            .unwrap();
        assert_eq!(data["favorites"], serde_json::json!(["T-1"]));
        assert_eq!(data["trials"]["nodes"][0]["favorite"], true);

        let data = schema
            .execute(r#"mutation { toggleFavorite(trialId: "T-1") }"#)
            .await
            .data
            .into_json()
            .unwrap();
        assert_eq!(data["toggleFavorite"], false);
    }

    #[tokio::test]
    async fn column_visibility() {
        let schema = TestSchema::new();
        let data = schema
            .execute(
                r#"mutation { setColumnVisibility(column: "status", visible: false) { column visible } }"#,
            )
            .await
            .data
            .into_json()
            .unwrap();
        let status = data["setColumnVisibility"]
            .as_array()
            .unwrap()
            .iter()
            .find(|c| c["column"] == "status")
            .unwrap();
        assert_eq!(status["visible"], false);

        for i in 0..MAX_VISIBLE_COLUMNS {
            let query = format!(
                r#"mutation {{ setColumnVisibility(column: "extra_{i}", visible: true) {{ column }} }}"#
            );
            schema.execute(&query).await;
        }
        let data = schema
            .execute("{ columnSettings { visible } }")
            .await
            .data
            .into_json()
            .unwrap();
        let visible = data["columnSettings"]
            .as_array()
            .unwrap()
            .iter()
            .filter(|c| c["visible"] == true)
            .count();
        assert_eq!(visible, MAX_VISIBLE_COLUMNS);

        let res = schema
            .execute(r#"mutation { setColumnVisibility(column: "one_more", visible: true) { column } }"#)
            .await;
        assert!(!res.errors.is_empty());

        let data = schema
            .execute("mutation { resetColumnSettings { column } }")
            .await
            .data
            .into_json()
            .unwrap();
        assert_eq!(
            data["resetColumnSettings"].as_array().unwrap().len(),
            super::DEFAULT_COLUMNS.len()
        );
    }

    #[tokio::test]
    async fn selection_is_kept_in_memory() {
        let schema = TestSchema::new();
        schema
            .execute(r#"mutation { toggleSelection(trialId: "T-2") { param } }"#)
            .await;
        let data = schema
            .execute(r#"mutation { toggleSelection(trialId: "T-1") { trialIds param } }"#)
            .await
            .data
            .into_json()
            .unwrap();
        assert_eq!(data["toggleSelection"]["param"], "T-1,T-2");

        let data = schema
            .execute("mutation { clearSelection { trialIds } }")
            .await
            .data
            .into_json()
            .unwrap();
        assert_eq!(data["clearSelection"]["trialIds"], serde_json::json!([]));
    }
}
