//! MongoDB end-to-end suite.
//!
//! Runs under the lifecycle controller: a fresh `mongo` container is started
//! and reachable through `MONGO_CONNECTION_URI` before the first test, and
//! removed after the last.

use anyhow::{Context, ensure};
use e2e::Widget;
use futures_util::TryStreamExt;
use mongodb::Database;
use mongodb::bson::doc;
use mongodb::options::ClientOptions;
use testing::{Suite, connection_uri, mongo_client, new_test_context, unique_collection};

async fn ping_primary() -> anyhow::Result<()> {
    let ctx = new_test_context();
    let client = mongo_client().await?;

    let reply = ctx
        .run(client.database("admin").run_command(doc! { "ping": 1 }))
        .await??;
    ensure!(reply.get_f64("ok").unwrap_or_default() == 1.0, "ping not ok: {reply}");
    Ok(())
}

async fn uri_carries_credentials() -> anyhow::Result<()> {
    let config = config::load()?;
    let options = ClientOptions::parse(connection_uri()?).await?;
    let credential = options.credential.context("URI carries no credential")?;

    assert_eq!(credential.username.as_deref(), Some(config.mongo.username.as_str()));
    assert_eq!(credential.password.as_deref(), Some(config.mongo.password.as_str()));
    assert_eq!(credential.source.as_deref(), Some(config.mongo.auth_source.as_str()));
    assert_eq!(
        options.default_database.as_deref(),
        Some(config.mongo.database.as_str())
    );
    Ok(())
}

/// The database named in the published URI.
async fn database() -> anyhow::Result<Database> {
    mongo_client()
        .await?
        .default_database()
        .context("URI names no database")
}

async fn insert_and_find_document() -> anyhow::Result<()> {
    let ctx = new_test_context();
    let collection = database()
        .await?
        .collection::<Widget>(&unique_collection("widgets"));

    let widget = Widget::new("sprocket", 3).with_tag("metal");
    ctx.run(collection.insert_one(&widget)).await??;

    let found = ctx
        .run(collection.find_one(widget.by_name()))
        .await??
        .context("inserted widget not found")?;
    assert_eq!(found, widget);

    ctx.run(collection.drop()).await??;
    Ok(())
}

async fn update_and_count_documents() -> anyhow::Result<()> {
    let ctx = new_test_context();
    let collection = database()
        .await?
        .collection::<Widget>(&unique_collection("inventory"));

    let widgets = vec![
        Widget::new("bolt", 10),
        Widget::new("nut", 20),
        Widget::new("washer", 0)
    ];
    ctx.run(collection.insert_many(&widgets)).await??;

    let updated = ctx
        .run(collection.update_many(
            doc! { "quantity": { "$gt": 0 } },
            doc! { "$inc": { "quantity": 5 } }
        ))
        .await??;
    assert_eq!(updated.modified_count, 2);

    let in_stock = ctx
        .run(collection.count_documents(doc! { "quantity": { "$gte": 15 } }))
        .await??;
    assert_eq!(in_stock, 2);

    let names: Vec<String> = ctx
        .run(collection.find(doc! {}).sort(doc! { "name": 1 }))
        .await??
        .map_ok(|w| w.name)
        .try_collect()
        .await?;
    assert_eq!(names, vec!["bolt", "nut", "washer"]);

    ctx.run(collection.drop()).await??;
    Ok(())
}

async fn collections_are_isolated() -> anyhow::Result<()> {
    let ctx = new_test_context();
    let db = database().await?;
    let first = db.collection::<Widget>(&unique_collection("isolated"));
    let second = db.collection::<Widget>(&unique_collection("isolated"));

    ctx.run(first.insert_one(Widget::new("gear", 1))).await??;
    let leaked = ctx.run(second.count_documents(doc! {})).await??;
    assert_eq!(leaked, 0);

    ctx.run(first.drop()).await??;
    Ok(())
}

fn main() {
    let suite = Suite::from_args()
        .trial("ping_primary", ping_primary)
        .trial("uri_carries_credentials", uri_carries_credentials)
        .trial("insert_and_find_document", insert_and_find_document)
        .trial("update_and_count_documents", update_and_count_documents)
        .trial("collections_are_isolated", collections_are_isolated);

    testing::lifecycle::main(suite)
}
