use std::sync::Arc;

use bytes::Bytes;
use snapgram::config::SocialConfig;
use snapgram::media_store::{LocalStore, MediaStore};
use snapgram::social::{Principal, SocialError, SocialService, Upload};
use snapgram::storage::models::WriteOp;
use snapgram::storage::Database;

struct Env {
    _dir: tempfile::TempDir,
    db: Database,
    media: Arc<dyn MediaStore>,
    service: SocialService,
}

fn setup() -> Env {
    let dir = tempfile::tempdir().unwrap();
    let db = Database::open(dir.path().join("data")).unwrap();
    let media: Arc<dyn MediaStore> =
        Arc::new(LocalStore::new(dir.path().join("media"), "/media").unwrap());
    let service = SocialService::local(db.clone(), Arc::clone(&media), SocialConfig::default());
    Env {
        _dir: dir,
        db,
        media,
        service,
    }
}

async fn sign_up(service: &SocialService, username: &str) -> Principal {
    let user = service
        .register_user(&format!("{username}@example.com"), username)
        .await
        .unwrap();
    Principal {
        id: user.id,
        username: user.username,
    }
}

fn photo() -> Upload {
    Upload {
        data: Bytes::from_static(b"jpeg bytes"),
        file_name: Some("photo.jpg".to_string()),
    }
}

#[tokio::test]
async fn test_post_engagement_and_deletion_journey() {
    let env = setup();
    let alice = sign_up(&env.service, "alice").await;
    let bob = sign_up(&env.service, "bob").await;

    let post = env
        .service
        .create_post(Some(&alice), "sunset", photo())
        .await
        .unwrap();
    env.service.toggle_like(Some(&bob), &post.id).await.unwrap();
    env.service
        .add_comment(Some(&bob), &post.id, "wow")
        .await
        .unwrap();
    assert!(env.service.toggle_follow(Some(&bob), "alice").await.unwrap());

    let feed = env.service.feed().unwrap();
    assert_eq!(feed.len(), 1);
    assert_eq!(feed[0].likes, 1);
    assert_eq!(feed[0].comments[0].body, "wow");
    assert_eq!(
        feed[0].comments[0].author.as_ref().unwrap().username,
        "bob"
    );
    assert_eq!(feed[0].owner.as_ref().unwrap().username, "alice");

    let likers = env.service.list_likers(&post.id).unwrap();
    assert_eq!(likers.len(), 1);
    assert_eq!(likers[0].username, "bob");

    let profile = env.service.view_profile("alice").await.unwrap();
    assert_eq!(profile.num_of_posts, 1);
    assert_eq!(profile.followers_count, 1);

    let err = env
        .service
        .delete_post(Some(&bob), &post.id)
        .await
        .unwrap_err();
    assert!(matches!(err, SocialError::Forbidden));

    let image = env.db.get_image(&post.image_id).unwrap().unwrap();
    let report = env.service.delete_post(Some(&alice), &post.id).await.unwrap();
    assert!(report.media_deleted);
    assert_eq!(report.comments_deleted, 1);
    assert!(!env.media.exists(&image.filename).await.unwrap());
    assert!(env.db.get_all_comments().unwrap().is_empty());

    assert!(env.service.feed().unwrap().is_empty());
    let err = env.service.get_post(&post.id).unwrap_err();
    assert!(matches!(err, SocialError::NotFound("Post")));

    let profile = env.service.view_profile("alice").await.unwrap();
    assert_eq!(profile.num_of_posts, 0);
    assert!(profile.posts.is_empty());
}

#[tokio::test]
async fn test_startup_resumes_interrupted_deletions() {
    let env = setup();
    let alice = sign_up(&env.service, "alice").await;
    let kept = env
        .service
        .create_post(Some(&alice), "keep", photo())
        .await
        .unwrap();
    let doomed = env
        .service
        .create_post(Some(&alice), "doomed", photo())
        .await
        .unwrap();

    // Simulate a crash after the first cascade step
    env.db
        .apply(&WriteOp::BeginPostDeletion {
            post_id: doomed.id.clone(),
        })
        .unwrap();
    let feed = env.service.feed().unwrap();
    assert_eq!(feed.len(), 1);
    assert_eq!(feed[0].id, kept.id);

    assert_eq!(env.service.resume_pending_deletions().await.unwrap(), 1);
    assert!(env.db.get_post(&doomed.id).unwrap().is_none());
    assert!(env.db.get_image(&doomed.image_id).unwrap().is_none());
    assert!(env.db.get_post(&kept.id).unwrap().is_some());

    assert_eq!(env.service.resume_pending_deletions().await.unwrap(), 0);
}

#[tokio::test]
async fn test_feed_is_newest_first() {
    let env = setup();
    let alice = sign_up(&env.service, "alice").await;
    for caption in ["first", "second", "third"] {
        env.service
            .create_post(Some(&alice), caption, photo())
            .await
            .unwrap();
    }

    let captions: Vec<String> = env
        .service
        .feed()
        .unwrap()
        .into_iter()
        .map(|post| post.caption)
        .collect();
    assert_eq!(captions, ["third", "second", "first"]);
}
