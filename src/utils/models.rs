use async_trait::async_trait;
use futures::stream::TryStreamExt;
use validator::Validate;
use wither::Model as WitherModel;
use wither::bson::Document;
use wither::mongodb::Database;
use wither::mongodb::options::FindOneAndUpdateOptions;
use wither::mongodb::options::FindOneOptions;
use wither::mongodb::options::FindOptions;
use wither::mongodb::options::ReturnDocument;
use wither::mongodb::options::UpdateOptions;
use wither::mongodb::results::DeleteResult;
use wither::mongodb::results::UpdateResult;

use crate::errors::Error;

// All models backed by a MongoDB collection implement this and inherit these
// methods. The database handle is passed in by the owning store.
#[async_trait]
pub trait ModelExt
where
    Self: WitherModel + Validate + Send + Sync,
{
    async fn create(db: &Database, mut model: Self) -> Result<Self, Error> {
        model
            .validate()
            .map_err(|e| Error::bad_request(&format!("Validation db error: {e:?}")))?;
        model.save(db, None).await.map_err(Error::Wither)?;

        Ok(model)
    }

    async fn find_one<O>(db: &Database, query: Document, options: O) -> Result<Option<Self>, Error>
    where
        O: Into<Option<FindOneOptions>> + Send,
    {
        <Self as WitherModel>::find_one(db, query, options)
            .await
            .map_err(Error::Wither)
    }

    async fn find_and_count<O>(
        db: &Database,
        query: Document,
        options: O,
    ) -> Result<(Vec<Self>, u64), Error>
    where
        O: Into<Option<FindOptions>> + Send,
    {
        let count = Self::collection(db)
            .count_documents(query.clone())
            .await
            .map_err(Error::Mongo)?;

        let items = <Self as WitherModel>::find(db, query, options.into())
            .await
            .map_err(Error::Wither)?
            .try_collect::<Vec<Self>>()
            .await
            .map_err(Error::Wither)?;

        Ok((items, count))
    }

    async fn find_one_and_update(
        db: &Database,
        query: Document,
        update: Document,
        upsert: bool,
    ) -> Result<Option<Self>, Error> {
        let options = FindOneAndUpdateOptions::builder()
            .upsert(upsert)
            .return_document(ReturnDocument::After)
            .build();

        <Self as WitherModel>::find_one_and_update(db, query, update, options)
            .await
            .map_err(Error::Wither)
    }

    async fn update_one<O>(
        db: &Database,
        query: Document,
        update: Document,
        options: O,
    ) -> Result<UpdateResult, Error>
    where
        O: Into<Option<UpdateOptions>> + Send,
    {
        Self::collection(db)
            .update_one(query, update)
            .with_options(options)
            .await
            .map_err(Error::Mongo)
    }

    async fn update_many(
        db: &Database,
        query: Document,
        update: Document,
    ) -> Result<UpdateResult, Error> {
        Self::collection(db)
            .update_many(query, update)
            .await
            .map_err(Error::Mongo)
    }

    async fn delete_one(db: &Database, query: Document) -> Result<DeleteResult, Error> {
        Self::collection(db)
            .delete_one(query)
            .await
            .map_err(Error::Mongo)
    }
}
