use futures::future::BoxFuture;
use shardlane_router::test_utils::{MemStore, MemStoreError};
use shardlane_router::{
    Entity,
    EntityGateway,
    Patch,
    Query,
    ShardEntry,
    ShardError,
    ShardRegistry,
    ShardingStrategy,
    StoreClient,
    StrategyRegistry,
    Value,
};

#[derive(Debug, Clone, PartialEq)]
struct Note {
    id: i64,
    body: String,
}

impl Note {
    fn new(id: i64, body: &str) -> Self {
        Self {
            id,
            body: body.to_string(),
        }
    }
}

impl Entity for Note {
    type Id = i64;

    fn table() -> &'static str {
        "notes"
    }

    fn id(&self) -> i64 {
        self.id
    }

    fn field(&self, column: &str) -> Option<Value> {
        match column {
            "id" => Some(self.id.into()),
            "body" => Some(self.body.as_str().into()),
            _ => None,
        }
    }

    fn apply(&mut self, patch: &Patch) {
        for (column, value) in patch.assignments() {
            if let ("body", Value::Text(body)) = (column.as_str(), value) {
                self.body = body.clone();
            }
        }
    }
}

fn open_mem(_params: ()) -> futures::future::Ready<Result<MemStore<Note>, MemStoreError>> {
    futures::future::ready(Ok(MemStore::new()))
}

#[tokio::test]
async fn test_empty_topology_is_rejected() {
    let err = ShardRegistry::connect(Vec::<ShardEntry<(), MemStore<Note>>>::new(), open_mem)
        .await
        .unwrap_err();
    assert!(matches!(err, ShardError::InvalidTopology { .. }));
}

#[tokio::test]
async fn test_duplicate_shard_keys_are_rejected() {
    let err = ShardRegistry::connect(
        vec![
            ShardEntry::new("a", ()).as_default(),
            ShardEntry::new("a", ()),
        ],
        open_mem,
    )
    .await
    .unwrap_err();
    assert!(
        matches!(err, ShardError::InvalidTopology { ref reason } if reason.contains("duplicate"))
    );
}

#[tokio::test]
async fn test_exactly_one_default_shard_is_required() {
    let none = ShardRegistry::connect(
        vec![
            ShardEntry::new("a", ()),
            ShardEntry::new("b", ()),
        ],
        open_mem,
    )
    .await
    .unwrap_err();
    assert!(matches!(none, ShardError::InvalidTopology { .. }));

    let two = ShardRegistry::connect(
        vec![
            ShardEntry::new("a", ()).as_default(),
            ShardEntry::new("b", ()).as_default(),
        ],
        open_mem,
    )
    .await
    .unwrap_err();
    assert!(matches!(two, ShardError::InvalidTopology { .. }));
}

#[tokio::test]
async fn test_registry_lookup_contract() {
    let registry = ShardRegistry::connect(
        vec![
            ShardEntry::new("a", ()).as_default(),
            ShardEntry::new("b", ()),
            ShardEntry::new("c", ()),
        ],
        open_mem,
    )
    .await
    .expect("connect registry");

    assert_eq!(registry.len(), 3);
    assert_eq!(registry.resolve_default().unwrap().key(), "a");
    assert_eq!(registry.resolve_by_key("b").unwrap().key(), "b");

    let keys: Vec<&str> = registry
        .all()
        .unwrap()
        .iter()
        .map(|shard| shard.key())
        .collect();
    assert_eq!(keys, vec!["a", "b", "c"]);

    assert!(matches!(
        registry.resolve_by_key("nope").unwrap_err(),
        ShardError::UnknownShardKey { .. },
    ));
    assert!(matches!(
        registry.resolve_by_key("").unwrap_err(),
        ShardError::DirectAccessForbidden,
    ));
}

#[tokio::test]
async fn test_destroy_is_idempotent_and_closes_every_store() {
    let _ = tracing_subscriber::fmt::try_init();

    let registry = ShardRegistry::connect(
        vec![
            ShardEntry::new("a", ()).as_default(),
            ShardEntry::new("b", ()),
        ],
        open_mem,
    )
    .await
    .expect("connect registry");

    assert!(registry.statuses().iter().all(|(_, live)| *live));

    registry.destroy().await.expect("destroy registry");
    registry.destroy().await.expect("second destroy is a no-op");

    assert!(registry.is_closed());
    assert!(registry.statuses().iter().all(|(_, live)| !*live));

    assert!(matches!(
        registry.resolve_default().unwrap_err(),
        ShardError::RegistryClosed,
    ));
    assert!(matches!(
        registry.all().unwrap_err(),
        ShardError::RegistryClosed,
    ));

    let notes = EntityGateway::<Note, MemStore<Note>>::plain(registry);
    assert!(matches!(
        notes.find(&Query::new(), None).await.unwrap_err(),
        ShardError::RegistryClosed,
    ));
}

fn seed_marker(store: &MemStore<Note>) -> BoxFuture<'_, Result<(), MemStoreError>> {
    Box::pin(async move {
        store.save(Note::new(777, "seeded")).await?;
        Ok(())
    })
}

#[tokio::test]
async fn test_init_hooks_run_against_each_shard() {
    let registry = ShardRegistry::connect(
        vec![
            ShardEntry::new("a", ()).as_default().on_init(seed_marker),
            ShardEntry::new("b", ()).on_init(seed_marker),
        ],
        open_mem,
    )
    .await
    .expect("connect registry");

    // Each hook ran against its own freshly opened store; a keyed read per
    // shard must see its marker row.
    let strategies =
        StrategyRegistry::new().bind::<Note>(ShardingStrategy::list(|_: &Note, _| false));
    let notes = EntityGateway::<Note, MemStore<Note>>::new(registry.clone(), &strategies);

    assert_eq!(notes.find_by_ids(&[777], Some("a")).await.unwrap().len(), 1);
    assert_eq!(notes.find_by_ids(&[777], Some("b")).await.unwrap().len(), 1);
}

#[tokio::test]
async fn test_plain_entities_ignore_sharding_keys() {
    let registry = ShardRegistry::connect(
        vec![ShardEntry::new("solo", ()).as_default()],
        open_mem,
    )
    .await
    .expect("connect registry");

    let notes = EntityGateway::<Note, MemStore<Note>>::plain(registry);

    notes.save_one(Note::new(1, "hello")).await.expect("save note");

    // The key argument is ignored for plain entities, even when it names
    // no configured shard.
    assert_eq!(notes.find(&Query::new(), Some("anything")).await.unwrap().len(), 1);
    assert_eq!(
        notes.find_one_by_id(&1, None).await.unwrap(),
        Some(Note::new(1, "hello")),
    );
    assert_eq!(notes.count(&Query::new(), Some("solo")).await.unwrap(), 1);
}
