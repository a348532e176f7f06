use futures::TryStreamExt;
use proptest::prelude::*;
use todo_store::models::{CreateTodo, Label, LabelId, LabelName, TodoId, TodoText};
use todo_store::{
    Associations, Batch, BatchOp, LabelStore, MemoryStore, StoreError, TodoStore,
};
use tracing_subscriber::EnvFilter;

fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_test_writer()
        .try_init();
}

async fn todo(store: &MemoryStore, text: &str) -> anyhow::Result<TodoId> {
    Ok(store
        .create_todo(CreateTodo::new(TodoText::new(text)?))
        .await?
        .id)
}

async fn label(store: &MemoryStore, name: &str) -> anyhow::Result<Label> {
    Ok(store.create_label(LabelName::new(name)?).await?)
}

#[tokio::test]
async fn duplicate_links_read_back_once() -> anyhow::Result<()> {
    init_tracing();
    let store = MemoryStore::new();
    let t = todo(&store, "water plants").await?;
    let home = label(&store, "home").await?;
    let weekly = label(&store, "weekly").await?;

    store.link(t, home.id).await?;
    store.link(t, weekly.id).await?;
    store.link(t, home.id).await?;

    let labels: Vec<Label> = store.labels_for(t).try_collect().await?;
    assert_eq!(labels, vec![home.clone(), weekly.clone()]);

    let todos: Vec<TodoId> = store.todos_for(home.id).try_collect().await?;
    assert_eq!(todos, vec![t]);

    // a second call is a fresh read
    let again: Vec<Label> = store.labels_for(t).try_collect().await?;
    assert_eq!(again, labels);
    Ok(())
}

#[tokio::test]
async fn unlink_is_idempotent() -> anyhow::Result<()> {
    let store = MemoryStore::new();
    let t = todo(&store, "file taxes").await?;
    let l = label(&store, "admin").await?;
    store.link(t, l.id).await?;
    store.link(t, l.id).await?;

    assert_eq!(store.unlink(t, l.id).await?, 2);
    assert_eq!(store.unlink(t, l.id).await?, 0);

    let labels: Vec<Label> = store.labels_for(t).try_collect().await?;
    assert!(labels.is_empty());
    Ok(())
}

#[tokio::test]
async fn dangling_link_rolls_back_the_whole_batch() -> anyhow::Result<()> {
    init_tracing();
    let store = MemoryStore::new();
    let t = store.reserve_todo_id().await?;
    let missing = store.reserve_label_id().await?;

    let err = store
        .apply(
            Batch::new()
                .create_todo(t, TodoText::new("orphaned")?)
                .link(t, missing),
        )
        .await
        .unwrap_err();
    assert!(matches!(err, StoreError::Integrity { .. }));

    // neither the todo nor the join row survived
    assert!(matches!(
        store.find_todo(t).await,
        Err(StoreError::NotFound { .. })
    ));
    let todos: Vec<TodoId> = store.todos_for(missing).try_collect().await?;
    assert!(todos.is_empty());
    Ok(())
}

#[tokio::test]
async fn single_link_to_missing_todo_fails() -> anyhow::Result<()> {
    let store = MemoryStore::new();
    let l = label(&store, "stray").await?;

    let err = store.link(TodoId(404), l.id).await.unwrap_err();
    assert!(matches!(err, StoreError::Integrity { .. }));

    let todos: Vec<TodoId> = store.todos_for(l.id).try_collect().await?;
    assert!(todos.is_empty());
    Ok(())
}

#[tokio::test]
async fn batch_commits_in_every_statement_order() -> anyhow::Result<()> {
    let store = MemoryStore::new();
    let orders: [[usize; 3]; 6] = [
        [0, 1, 2],
        [0, 2, 1],
        [1, 0, 2],
        [1, 2, 0],
        [2, 0, 1],
        [2, 1, 0],
    ];

    for order in orders {
        let t = store.reserve_todo_id().await?;
        let l = store.reserve_label_id().await?;
        let ops = [
            BatchOp::CreateTodo {
                id: t,
                text: TodoText::new("ordered")?,
            },
            BatchOp::CreateLabel {
                id: l,
                name: LabelName::new("ordered")?,
            },
            BatchOp::Link {
                todo_id: t,
                label_id: l,
            },
        ];
        let batch: Batch = order.iter().map(|&i| ops[i].clone()).collect();

        let receipt = store.apply(batch).await?;
        assert_eq!(receipt.links.len(), 1, "order {:?}", order);

        let labels: Vec<Label> = store.labels_for(t).try_collect().await?;
        assert_eq!(labels.len(), 1, "order {:?}", order);
        assert_eq!(labels[0].id, l);
    }
    Ok(())
}

#[tokio::test]
async fn unreserved_batch_ids_do_not_collide_with_later_inserts() -> anyhow::Result<()> {
    let store = MemoryStore::new();
    store
        .apply(
            Batch::new()
                .create_todo(TodoId(50), TodoText::new("picked id")?)
                .create_label(LabelId(50), LabelName::new("picked")?),
        )
        .await?;

    let next = todo(&store, "sequenced").await?;
    assert!(next > TodoId(50));
    let l = label(&store, "sequenced").await?;
    assert!(l.id > LabelId(50));
    Ok(())
}

#[tokio::test]
async fn referenced_label_delete_is_refused_until_unlinked() -> anyhow::Result<()> {
    let store = MemoryStore::new();
    let a = todo(&store, "first").await?;
    let b = todo(&store, "second").await?;
    let l = label(&store, "shared").await?;
    store.link(a, l.id).await?;
    store.link(b, l.id).await?;

    let err = store.delete_label(l.id).await.unwrap_err();
    assert!(matches!(err, StoreError::Referential { resource: "label", .. }));
    assert_eq!(store.get_label(l.id).await?, l);

    store.unlink(a, l.id).await?;
    assert!(matches!(
        store.delete_label(l.id).await,
        Err(StoreError::Referential { .. })
    ));

    store.unlink(b, l.id).await?;
    store.delete_label(l.id).await?;
    assert!(matches!(
        store.get_label(l.id).await,
        Err(StoreError::NotFound { .. })
    ));
    Ok(())
}

#[tokio::test]
async fn referenced_todo_delete_does_not_cascade() -> anyhow::Result<()> {
    let store = MemoryStore::new();
    let t = todo(&store, "labelled").await?;
    let l = label(&store, "keep").await?;
    store.link(t, l.id).await?;

    let err = store.delete_todo(t).await.unwrap_err();
    assert!(matches!(err, StoreError::Referential { resource: "todo", .. }));

    let labels: Vec<Label> = store.labels_for(t).try_collect().await?;
    assert_eq!(labels, vec![l]);
    Ok(())
}

#[tokio::test]
async fn unlink_and_delete_in_one_batch() -> anyhow::Result<()> {
    let store = MemoryStore::new();
    let t = todo(&store, "cleanup").await?;
    let l = label(&store, "obsolete").await?;
    store.link(t, l.id).await?;

    let receipt = store.apply(Batch::new().unlink(t, l.id)).await?;
    assert_eq!(receipt.unlinked, 1);
    store.delete_label(l.id).await?;
    store.delete_todo(t).await?;

    assert!(store.all_todos().await?.is_empty());
    assert!(store.all_labels().await?.is_empty());
    Ok(())
}

#[tokio::test]
async fn duplicate_label_names_are_distinct_rows() -> anyhow::Result<()> {
    let store = MemoryStore::new();
    let a = label(&store, "urgent").await?;
    let b = label(&store, "urgent").await?;

    assert_ne!(a.id, b.id);
    assert_eq!(store.all_labels().await?, vec![a, b]);
    Ok(())
}

#[tokio::test]
async fn missing_rows_are_not_found() -> anyhow::Result<()> {
    let store = MemoryStore::new();

    assert!(matches!(
        store.delete_todo(TodoId(1)).await,
        Err(StoreError::NotFound { resource: "todo", .. })
    ));
    assert!(matches!(
        store.delete_label(LabelId(1)).await,
        Err(StoreError::NotFound { resource: "label", .. })
    ));
    assert!(matches!(
        store.update_todo(TodoId(1), Default::default()).await,
        Err(StoreError::NotFound { .. })
    ));
    Ok(())
}

#[tokio::test]
async fn todos_list_newest_first() -> anyhow::Result<()> {
    let store = MemoryStore::new();
    let first = todo(&store, "one").await?;
    let second = todo(&store, "two").await?;

    let ids: Vec<TodoId> = store.all_todos().await?.iter().map(|t| t.id).collect();
    assert_eq!(ids, vec![second, first]);
    Ok(())
}

#[tokio::test]
async fn concurrent_links_are_all_kept() -> anyhow::Result<()> {
    let store = MemoryStore::new();
    let t = todo(&store, "popular").await?;

    let mut handles = Vec::new();
    for i in 0..16 {
        let store = store.clone();
        handles.push(tokio::spawn(async move {
            let l = store
                .create_label(LabelName::new(&format!("tag-{}", i)).unwrap())
                .await
                .unwrap();
            store.link(t, l.id).await.unwrap()
        }));
    }
    for handle in handles {
        handle.await?;
    }

    let labels: Vec<Label> = store.labels_for(t).try_collect().await?;
    assert_eq!(labels.len(), 16);
    Ok(())
}

proptest! {
    /// Every linked pair is reported exactly once from both sides, in
    /// first-link order.
    #[test]
    fn prop_links_read_back_once(pairs in prop::collection::vec((0usize..4, 0usize..4), 0..40)) {
        let rt = tokio::runtime::Builder::new_current_thread().build().unwrap();
        rt.block_on(async {
            let store = MemoryStore::new();
            let mut todos = Vec::new();
            let mut labels = Vec::new();
            for i in 0..4 {
                todos.push(todo(&store, &format!("todo {}", i)).await.unwrap());
                labels.push(label(&store, &format!("label {}", i)).await.unwrap());
            }

            for &(t, l) in &pairs {
                store.link(todos[t], labels[l].id).await.unwrap();
            }

            for (t, &todo_id) in todos.iter().enumerate() {
                let mut expected: Vec<LabelId> = Vec::new();
                for &(pt, pl) in &pairs {
                    if pt == t && !expected.contains(&labels[pl].id) {
                        expected.push(labels[pl].id);
                    }
                }
                let got: Vec<LabelId> = store
                    .labels_for(todo_id)
                    .map_ok(|l| l.id)
                    .try_collect()
                    .await
                    .unwrap();
                assert_eq!(got, expected);
            }

            for (l, label) in labels.iter().enumerate() {
                let mut expected: Vec<TodoId> = Vec::new();
                for &(pt, pl) in &pairs {
                    if pl == l && !expected.contains(&todos[pt]) {
                        expected.push(todos[pt]);
                    }
                }
                let got: Vec<TodoId> = store.todos_for(label.id).try_collect().await.unwrap();
                assert_eq!(got, expected);
            }
        });
    }
}
