use std::sync::LazyLock;
use tether::{Connection, Executor, Mapped, Values, equals};
use tokio::sync::Mutex;

#[derive(Mapped, Debug)]
struct Playlist {
    #[tether(key)]
    code: String,
    tracks: Vec<String>,
    durations: Vec<i64>,
    ratings: Option<Vec<f64>>,
}

static MUTEX: LazyLock<Mutex<()>> = LazyLock::new(|| Mutex::new(()));

pub async fn lists<X: Executor>(connection: &mut Connection<X>) {
    let _lock = MUTEX.lock().await;
    const SCHEMA: &str = "music";

    connection
        .drop_table::<Playlist>(SCHEMA)
        .await
        .expect("Failed to drop the Playlist table");
    connection
        .create_table::<Playlist>(SCHEMA)
        .await
        .expect("Failed to create the Playlist table");

    connection
        .insert::<Playlist>(
            SCHEMA,
            Values::new()
                .with("code", "road")
                .with("tracks", vec!["Roadrunner".to_string(), "Radar Love".into()])
                .with("durations", vec![244_i64, 383])
                .with("ratings", vec![4.5, 5.0]),
        )
        .await
        .expect("Failed to insert the road playlist");
    connection
        .insert::<Playlist>(
            SCHEMA,
            Values::new()
                .with("code", "empty")
                .with("tracks", Vec::<String>::new())
                .with("durations", Vec::<i64>::new()),
        )
        .await
        .expect("Failed to insert the empty playlist");

    let road = connection
        .select_one::<Playlist>(SCHEMA, &equals("code", "road"))
        .await
        .expect("Failed to query the road playlist")
        .expect("Expected the road playlist to exist");
    {
        let road = road.read();
        assert_eq!(road.tracks, ["Roadrunner", "Radar Love"]);
        assert_eq!(road.durations, [244, 383]);
        assert_eq!(road.ratings, Some(vec![4.5, 5.0]));
    }
    let empty = connection
        .select_one::<Playlist>(SCHEMA, &equals("code", "empty"))
        .await
        .expect("Failed to query the empty playlist")
        .expect("Expected the empty playlist to exist");
    {
        let empty = empty.read();
        assert!(empty.tracks.is_empty());
        assert!(empty.durations.is_empty());
        assert_eq!(empty.ratings, None);
    }

    road.write().tracks.push("Highway Star".into());
    connection
        .update(SCHEMA, &road)
        .await
        .expect("Failed to update the road playlist");
    let road = connection
        .select_one::<Playlist>(SCHEMA, &equals("code", "road"))
        .await
        .expect("Failed to query the road playlist")
        .expect("Expected the road playlist to exist");
    assert_eq!(road.read().tracks.len(), 3);

    connection
        .drop_table::<Playlist>(SCHEMA)
        .await
        .expect("Failed to drop the Playlist table");
}
