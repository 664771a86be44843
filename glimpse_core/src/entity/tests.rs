#[cfg(test)]
mod entity_tests {
    use crate::entity::prelude::*;
    use crate::ids::*;
    use crate::models::migrator::Migrator;
    use chrono::Utc;
    use sea_orm_migration::MigratorTrait;

    /// Test helper to create and migrate an in-memory database
    async fn setup_test_db() -> DatabaseConnection {
        let db = Database::connect("sqlite::memory:")
            .await
            .expect("Failed to create in-memory database");

        // Run all migrations
        Migrator::up(&db, None)
            .await
            .expect("Failed to run migrations");

        db
    }

    async fn insert_user(db: &DatabaseConnection, username: &str) -> UserModel {
        let user = UserActiveModel {
            id: Set(UserId::new()),
            username: Set(username.to_string()),
            email: Set(format!("{username}@example.com")),
            full_name: Set(None),
            description: Set(None),
            avatar_url: Set(None),
            is_public: Set(false),
            role: Set(Role::User),
            created_at: Set(Utc::now()),
        };
        User::insert(user)
            .exec_with_returning(db)
            .await
            .expect("Failed to insert user")
    }

    async fn insert_post(db: &DatabaseConnection, author_id: UserId, text: &str) -> PostModel {
        let post = PostActiveModel {
            id: Set(PostId::new()),
            author_id: Set(author_id),
            text_content: Set(Some(text.to_string())),
            image_url: Set(None),
            video_url: Set(None),
            created_at: Set(Utc::now()),
            sentiment_label: Set(None),
            sentiment_confidence: Set(None),
            sentiment_analyzed_at: Set(None),
        };
        Post::insert(post).exec_with_returning(db).await.unwrap()
    }

    async fn insert_group(db: &DatabaseConnection, moderator_id: UserId) -> GroupModel {
        let group = GroupActiveModel {
            id: Set(GroupId::new()),
            name: Set("Night Owls".to_string()),
            description: Set("Late chats".to_string()),
            moderator_id: Set(moderator_id),
            created_at: Set(Utc::now()),
        };
        Group::insert(group).exec_with_returning(db).await.unwrap()
    }

    #[tokio::test]
    async fn test_create_and_find_user() {
        let db = setup_test_db().await;
        let user = insert_user(&db, "alice").await;

        let found = User::find()
            .filter(UserColumn::Username.eq("alice"))
            .one(&db)
            .await
            .expect("Failed to query user");

        assert_eq!(found, Some(user));
    }

    #[tokio::test]
    async fn test_username_and_email_are_unique() {
        let db = setup_test_db().await;
        let alice = insert_user(&db, "alice").await;

        let clash = UserActiveModel {
            id: Set(UserId::new()),
            username: Set("alice".to_string()),
            email: Set("other@example.com".to_string()),
            full_name: Set(None),
            description: Set(None),
            avatar_url: Set(None),
            is_public: Set(true),
            role: Set(Role::User),
            created_at: Set(Utc::now()),
        };
        assert!(User::insert(clash).exec(&db).await.is_err());

        let clash = UserActiveModel {
            id: Set(UserId::new()),
            username: Set("alice2".to_string()),
            email: Set(alice.email.clone()),
            full_name: Set(None),
            description: Set(None),
            avatar_url: Set(None),
            is_public: Set(true),
            role: Set(Role::User),
            created_at: Set(Utc::now()),
        };
        assert!(User::insert(clash).exec(&db).await.is_err());
    }

    #[tokio::test]
    async fn test_role_round_trip() {
        let db = setup_test_db().await;
        let user = insert_user(&db, "alice").await;

        let mut active: UserActiveModel = user.into();
        active.role = Set(Role::Administrator);
        let updated = active.update(&db).await.unwrap();

        let admins = User::find()
            .filter(UserColumn::Role.eq(Role::Administrator))
            .all(&db)
            .await
            .unwrap();
        assert_eq!(admins, vec![updated]);
    }

    #[tokio::test]
    async fn test_identity_links_node_to_user() {
        let db = setup_test_db().await;
        let user = insert_user(&db, "alice").await;
        let node_id = vec![7u8; 32];

        Identity::insert(IdentityActiveModel {
            node_id: Set(node_id.clone()),
            user_id: Set(user.id),
        })
        .exec(&db)
        .await
        .unwrap();

        let (identity, owner) = Identity::find_by_id(node_id)
            .find_also_related(User)
            .one(&db)
            .await
            .unwrap()
            .unwrap();
        assert_eq!(identity.user_id, user.id);
        assert_eq!(owner.map(|u| u.username), Some("alice".to_string()));
    }

    #[tokio::test]
    async fn test_post_sentiment_round_trip() {
        let db = setup_test_db().await;
        let user = insert_user(&db, "alice").await;
        let post = insert_post(&db, user.id, "lovely day").await;

        let mut active: PostActiveModel = post.into();
        active.sentiment_label = Set(Some(SentimentLabel::Negative));
        active.sentiment_confidence = Set(Some(0.75));
        active.sentiment_analyzed_at = Set(Some(Utc::now()));
        active.update(&db).await.unwrap();

        let negative = Post::find()
            .filter(PostColumn::SentimentLabel.eq(SentimentLabel::Negative))
            .one(&db)
            .await
            .unwrap()
            .unwrap();
        assert_eq!(negative.sentiment_confidence, Some(0.75));
    }

    #[tokio::test]
    async fn test_user_posts_relation() {
        let db = setup_test_db().await;
        let alice = insert_user(&db, "alice").await;
        let bob = insert_user(&db, "bob").await;
        insert_post(&db, alice.id, "one").await;
        insert_post(&db, alice.id, "two").await;
        insert_post(&db, bob.id, "three").await;

        let posts = alice.find_related(Post).all(&db).await.unwrap();
        assert_eq!(posts.len(), 2);
        assert!(posts.iter().all(|p| p.author_id == alice.id));
    }

    #[tokio::test]
    async fn test_post_requires_existing_author() {
        let db = setup_test_db().await;

        let orphan = PostActiveModel {
            id: Set(PostId::new()),
            author_id: Set(UserId::new()),
            text_content: Set(Some("nobody wrote this".to_string())),
            image_url: Set(None),
            video_url: Set(None),
            created_at: Set(Utc::now()),
            sentiment_label: Set(None),
            sentiment_confidence: Set(None),
            sentiment_analyzed_at: Set(None),
        };
        assert!(Post::insert(orphan).exec(&db).await.is_err());
    }

    #[tokio::test]
    async fn test_like_is_unique_per_user_and_post() {
        let db = setup_test_db().await;
        let user = insert_user(&db, "alice").await;
        let post = insert_post(&db, user.id, "like me").await;

        let like = || LikeActiveModel {
            user_id: Set(user.id),
            post_id: Set(post.id),
            created_at: Set(Utc::now()),
        };
        Like::insert(like()).exec(&db).await.unwrap();
        assert!(Like::insert(like()).exec(&db).await.is_err());
    }

    #[tokio::test]
    async fn test_collection_names_unique_per_owner() {
        let db = setup_test_db().await;
        let alice = insert_user(&db, "alice").await;
        let bob = insert_user(&db, "bob").await;

        let collection = |owner: UserId| CollectionActiveModel {
            id: Set(CollectionId::new()),
            user_id: Set(owner),
            name: Set(DEFAULT_COLLECTION_NAME.to_string()),
            is_default: Set(true),
            created_at: Set(Utc::now()),
        };
        Collection::insert(collection(alice.id)).exec(&db).await.unwrap();
        Collection::insert(collection(bob.id)).exec(&db).await.unwrap();
        assert!(Collection::insert(collection(alice.id)).exec(&db).await.is_err());
    }

    #[tokio::test]
    async fn test_follow_status_round_trip() {
        let db = setup_test_db().await;
        let alice = insert_user(&db, "alice").await;
        let bob = insert_user(&db, "bob").await;

        FollowRequest::insert(FollowRequestActiveModel {
            follower_id: Set(alice.id),
            following_id: Set(bob.id),
            status: Set(FollowStatus::Declined),
            created_at: Set(Utc::now()),
        })
        .exec(&db)
        .await
        .unwrap();

        let request = FollowRequest::find_by_id((alice.id, bob.id))
            .one(&db)
            .await
            .unwrap()
            .unwrap();
        assert_eq!(request.status, FollowStatus::Declined);
    }

    #[tokio::test]
    async fn test_group_members_cascade_with_group() {
        let db = setup_test_db().await;
        let moderator = insert_user(&db, "mod").await;
        let group = insert_group(&db, moderator.id).await;

        GroupMember::insert(GroupMemberActiveModel {
            group_id: Set(group.id),
            user_id: Set(moderator.id),
            status: Set(MembershipStatus::Moderator),
            joined_at: Set(Utc::now()),
        })
        .exec(&db)
        .await
        .unwrap();

        let members = group.find_related(GroupMember).all(&db).await.unwrap();
        assert_eq!(members.len(), 1);
        assert!(members[0].status.is_active());

        Group::delete_by_id(group.id).exec(&db).await.unwrap();
        assert_eq!(GroupMember::find().count(&db).await.unwrap(), 0);
    }

    #[tokio::test]
    async fn test_message_author_nulled_with_user() {
        let db = setup_test_db().await;
        let moderator = insert_user(&db, "mod").await;
        let author = insert_user(&db, "author").await;
        let group = insert_group(&db, moderator.id).await;

        let message = Message::insert(MessageActiveModel {
            id: Set(MessageId::new()),
            group_id: Set(group.id),
            user_id: Set(Some(author.id)),
            text_content: Set(Some("hello".to_string())),
            image_url: Set(None),
            video_url: Set(None),
            created_at: Set(Utc::now()),
            edited_at: Set(None),
            is_safe: Set(None),
            is_reported: Set(false),
        })
        .exec_with_returning(&db)
        .await
        .unwrap();

        User::delete_by_id(author.id).exec(&db).await.unwrap();

        let kept = Message::find_by_id(message.id).one(&db).await.unwrap().unwrap();
        assert_eq!(kept.user_id, None);
        assert_eq!(kept.text_content.as_deref(), Some("hello"));
    }
}
