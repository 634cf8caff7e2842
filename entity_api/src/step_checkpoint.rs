use super::error::Error;
use entity::step_checkpoints::{ActiveModel, Column, Entity};
use entity::Id;
use sea_orm::{
    entity::prelude::*, sea_query::OnConflict, ActiveValue::Set, ConnectionTrait,
};

/// Stored output of `step_name` within `run_id`, if the step already completed.
pub async fn find(
    db: &impl ConnectionTrait,
    run_id: Id,
    step_name: &str,
) -> Result<Option<Json>, Error> {
    Ok(Entity::find()
        .filter(Column::RunId.eq(run_id))
        .filter(Column::StepName.eq(step_name))
        .one(db)
        .await?
        .map(|checkpoint| checkpoint.output))
}

/// Saves a step's output. A checkpoint that already exists is left untouched.
pub async fn save(
    db: &impl ConnectionTrait,
    run_id: Id,
    step_name: &str,
    output: Json,
) -> Result<(), Error> {
    let active_model = ActiveModel {
        id: Set(Id::new_v4()),
        run_id: Set(run_id),
        step_name: Set(step_name.to_string()),
        output: Set(output),
        created_at: Set(chrono::Utc::now().into()),
    };

    Entity::insert(active_model)
        .on_conflict(
            OnConflict::columns([Column::RunId, Column::StepName])
                .do_nothing()
                .to_owned(),
        )
        .exec_without_returning(db)
        .await?;

    Ok(())
}
