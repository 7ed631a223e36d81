//! Usernames, profile edits, and image flows

mod support;

use social::{
    MediaGateway, PeopleQuery, Session, SocialError,
    models::{ImageSlot, ProfileSignup, ProfileUpdate},
};
use support::World;

const PNG: &str = "image/png";

#[tokio::test]
async fn signup_reserves_the_username() {
    let world = World::new();
    assert!(world.profiles.check_username_availability("Asha.Rao").await.unwrap());

    let session = world.session("asha");
    let profile = world
        .profiles
        .create_profile(
            &session,
            ProfileSignup {
                username: "Asha.Rao".to_string(),
                display_name: None,
                photo_url: None,
            },
        )
        .await
        .unwrap();

    assert_eq!(profile.username, "asha.rao");
    assert_eq!(profile.display_name, "asha.rao");
    assert_eq!(profile.email, "asha@kiit.ac.in");
    assert_eq!(profile.connections_count, 0);
    assert!(!world.profiles.check_username_availability("asha.rao").await.unwrap());
    assert!(!world.profiles.check_username_availability("ab").await.unwrap());

    let found = world.profiles.find_by_username("ASHA.RAO").await.unwrap().unwrap();
    assert_eq!(found.uid, "asha");
}

#[tokio::test]
async fn taken_usernames_and_second_profiles_are_rejected() {
    let world = World::new();
    world.user("asha").await;

    let err = world
        .profiles
        .create_profile(
            &world.session("other"),
            ProfileSignup {
                username: "asha.user".to_string(),
                display_name: None,
                photo_url: None,
            },
        )
        .await
        .unwrap_err();
    assert!(matches!(err, SocialError::UsernameTaken(_)));
    assert!(world.profiles.get_profile("other").await.is_err());

    let err = world
        .profiles
        .create_profile(
            &world.session("asha"),
            ProfileSignup {
                username: "fresh.name".to_string(),
                display_name: None,
                photo_url: None,
            },
        )
        .await
        .unwrap_err();
    assert!(matches!(err, SocialError::Conflict(_)));
    assert!(world.profiles.check_username_availability("fresh.name").await.unwrap());
}

#[tokio::test]
async fn rename_moves_the_reservation() {
    let world = World::new();
    let asha = world.user("asha").await;
    world.user("bikram").await;

    let (old, profile) = world.profiles.rename_username(&asha, "Asha.R").await.unwrap();
    assert_eq!(old, "asha.user");
    assert_eq!(profile.username, "asha.r");

    assert!(world.profiles.check_username_availability("asha.user").await.unwrap());
    assert!(!world.profiles.check_username_availability("asha.r").await.unwrap());
    assert!(world.profiles.find_by_username("asha.user").await.unwrap().is_none());

    let err = world
        .profiles
        .rename_username(&asha, "bikram.user")
        .await
        .unwrap_err();
    assert!(matches!(err, SocialError::UsernameTaken(_)));
    assert_eq!(world.profiles.get_profile("asha").await.unwrap().username, "asha.r");
}

#[tokio::test]
async fn updates_are_normalized() {
    let world = World::new();
    let asha = world.user("asha").await;

    let profile = world
        .profiles
        .update_profile(
            &asha,
            ProfileUpdate {
                bio: Some("  Loves graphs  ".to_string()),
                semester: Some(5),
                interests: Some(vec![
                    "Coding".to_string(),
                    "Chess".to_string(),
                    "Coding".to_string(),
                ]),
                is_profile_complete: Some(true),
                ..Default::default()
            },
        )
        .await
        .unwrap();

    assert_eq!(profile.bio.as_deref(), Some("Loves graphs"));
    assert_eq!(profile.year(), Some(3));
    assert_eq!(profile.interests, vec!["Coding", "Chess"]);
    assert!(profile.is_profile_complete);
    assert_eq!(profile.display_name, "User asha");

    let err = world
        .profiles
        .update_profile(
            &asha,
            ProfileUpdate {
                semester: Some(9),
                ..Default::default()
            },
        )
        .await
        .unwrap_err();
    assert!(matches!(err, SocialError::Invalid(_)));

    let err = world
        .profiles
        .update_profile(&asha, ProfileUpdate::default())
        .await
        .unwrap_err();
    assert!(matches!(err, SocialError::Invalid(_)));
}

#[tokio::test]
async fn avatar_upload_replaces_and_cleans_up_the_old_image() {
    let world = World::new();
    let asha = world.user("asha").await;

    let first = world
        .profiles
        .upload_profile_image(&asha, ImageSlot::Avatar, vec![1, 2, 3], PNG)
        .await
        .unwrap();
    let second = world
        .profiles
        .upload_profile_image(&asha, ImageSlot::Avatar, vec![4, 5, 6], PNG)
        .await
        .unwrap();

    let profile = world.profiles.get_profile("asha").await.unwrap();
    assert_eq!(profile.photo_url.as_deref(), Some(second.as_str()));
    assert!(!world.media.contains(&first).await);
    assert!(world.media.contains(&second).await);
    assert_eq!(world.media.object_count().await, 1);
}

#[tokio::test]
async fn failed_profile_write_deletes_the_upload() {
    let world = World::new();
    let ghost = world.session("ghost");

    let err = world
        .profiles
        .upload_profile_image(&ghost, ImageSlot::Cover, vec![1, 2, 3], PNG)
        .await
        .unwrap_err();
    assert!(matches!(err, SocialError::NotFound { .. }));
    assert_eq!(world.media.object_count().await, 0);

    let err = world
        .profiles
        .add_post(&ghost, vec![1, 2, 3], PNG)
        .await
        .unwrap_err();
    assert!(matches!(err, SocialError::NotFound { .. }));
    assert_eq!(world.media.object_count().await, 0);
}

#[tokio::test]
async fn media_failures_surface_before_profile_writes() {
    let world = World::new();
    let asha = world.user("asha").await;

    world.media.fail_uploads(true);
    let err = world
        .profiles
        .add_post(&asha, vec![1], PNG)
        .await
        .unwrap_err();
    assert!(matches!(err, SocialError::Media(_)));
    assert!(world.profiles.get_profile("asha").await.unwrap().posts.is_empty());
}

#[tokio::test]
async fn posts_can_be_added_and_deleted() {
    let world = World::new();
    let asha = world.user("asha").await;
    let bikram = world.user("bikram").await;

    let profile = world.profiles.add_post(&asha, vec![9; 16], "image/jpeg").await.unwrap();
    assert_eq!(profile.posts.len(), 1);
    let url = profile.posts[0].clone();
    assert!(world.media.owns(&url));

    let err = world.profiles.delete_post(&bikram, &url).await.unwrap_err();
    assert!(matches!(err, SocialError::NotFound { .. }));

    // A media-side failure does not keep the post on the profile
    world.media.fail_deletes(true);
    world.profiles.delete_post(&asha, &url).await.unwrap();
    assert!(world.profiles.get_profile("asha").await.unwrap().posts.is_empty());
}

#[tokio::test]
async fn directory_excludes_the_viewer() {
    let world = World::new();
    world.user("asha").await;
    world.user("bikram").await;
    world.user("chitra").await;

    let everyone = world
        .profiles
        .directory("asha", &PeopleQuery::default())
        .await
        .unwrap();
    assert_eq!(everyone.len(), 2);
    assert!(everyone.iter().all(|p| p.uid != "asha"));

    let query = PeopleQuery {
        q: Some("CHITRA".to_string()),
        ..Default::default()
    };
    let hits = world.profiles.directory("asha", &query).await.unwrap();
    assert_eq!(hits.len(), 1);
    assert_eq!(hits[0].uid, "chitra");
}

#[tokio::test]
async fn failed_post_removal_keeps_the_image() {
    let world = World::new();
    let asha = world.user("asha").await;

    let profile = world.profiles.add_post(&asha, vec![9; 16], PNG).await.unwrap();
    let url = profile.posts[0].clone();

    world.store.fail_post_writes(true);
    let err = world.profiles.delete_post(&asha, &url).await.unwrap_err();
    assert!(matches!(err, SocialError::Store(_)));
    assert!(world.media.contains(&url).await);
    assert_eq!(world.profiles.get_profile("asha").await.unwrap().posts, vec![url.clone()]);

    world.store.fail_post_writes(false);
    world.profiles.delete_post(&asha, &url).await.unwrap();
    assert!(!world.media.contains(&url).await);
}

#[tokio::test]
async fn unverified_accounts_cannot_edit_profiles() {
    let world = World::new();
    let eve = Session::new("eve", Some("eve@kiit.ac.in".to_string()), false).unwrap();

    let err = world
        .profiles
        .create_profile(
            &eve,
            ProfileSignup {
                username: "eve.k".to_string(),
                display_name: None,
                photo_url: None,
            },
        )
        .await
        .unwrap_err();
    assert!(matches!(err, SocialError::Forbidden(_)));
    assert!(world.profiles.check_username_availability("eve.k").await.unwrap());

    let err = world.profiles.add_post(&eve, vec![1; 8], PNG).await.unwrap_err();
    assert!(matches!(err, SocialError::Forbidden(_)));
    assert_eq!(world.media.object_count().await, 0);
}
