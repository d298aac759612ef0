use sea_orm_migration::prelude::*;

pub struct Migrator;

#[async_trait::async_trait]
impl MigratorTrait for Migrator {
    fn migrations() -> Vec<Box<dyn MigrationTrait>> {
        vec![
            Box::new(m20240101_000001_create_menu_items_table::Migration),
            Box::new(m20240101_000002_create_users_tables::Migration),
            Box::new(m20240101_000003_create_carts_table::Migration),
            Box::new(m20240101_000004_create_orders_table::Migration),
            Box::new(m20240101_000005_create_reviews_table::Migration),
            Box::new(m20240101_000006_create_password_reset_tokens_table::Migration),
        ]
    }
}

mod m20240101_000001_create_menu_items_table {
    use sea_orm_migration::prelude::*;

    pub struct Migration;

    impl MigrationName for Migration {
        fn name(&self) -> &str {
            "m20240101_000001_create_menu_items_table"
        }
    }

    #[async_trait::async_trait]
    impl MigrationTrait for Migration {
        async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
            manager
                .create_table(
                    Table::create()
                        .table(MenuItems::Table)
                        .if_not_exists()
                        .col(
                            ColumnDef::new(MenuItems::Id)
                                .integer()
                                .not_null()
                                .auto_increment()
                                .primary_key(),
                        )
                        .col(ColumnDef::new(MenuItems::Name).string().not_null())
                        .col(ColumnDef::new(MenuItems::Category).string_len(20).not_null())
                        .col(
                            ColumnDef::new(MenuItems::Price)
                                .decimal_len(19, 4)
                                .not_null(),
                        )
                        .col(ColumnDef::new(MenuItems::ItemType).string_len(10).not_null())
                        .col(ColumnDef::new(MenuItems::Rating).float().not_null())
                        .col(ColumnDef::new(MenuItems::PrepTime).string().not_null())
                        .col(ColumnDef::new(MenuItems::Description).text().not_null())
                        .col(ColumnDef::new(MenuItems::IsSpecial).boolean().not_null())
                        .col(ColumnDef::new(MenuItems::ImageUrl).string().not_null())
                        .col(
                            ColumnDef::new(MenuItems::CreatedAt)
                                .timestamp_with_time_zone()
                                .not_null(),
                        )
                        .col(
                            ColumnDef::new(MenuItems::UpdatedAt)
                                .timestamp_with_time_zone()
                                .not_null(),
                        )
                        .to_owned(),
                )
                .await
        }

        async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
            manager
                .drop_table(Table::drop().table(MenuItems::Table).to_owned())
                .await
        }
    }

    #[derive(DeriveIden)]
    enum MenuItems {
        Table,
        Id,
        Name,
        Category,
        Price,
        ItemType,
        Rating,
        PrepTime,
        Description,
        IsSpecial,
        ImageUrl,
        CreatedAt,
        UpdatedAt,
    }
}

mod m20240101_000002_create_users_tables {
    use sea_orm_migration::prelude::*;

    pub struct Migration;

    impl MigrationName for Migration {
        fn name(&self) -> &str {
            "m20240101_000002_create_users_tables"
        }
    }

    #[async_trait::async_trait]
    impl MigrationTrait for Migration {
        async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
            manager
                .create_table(
                    Table::create()
                        .table(Users::Table)
                        .if_not_exists()
                        .col(ColumnDef::new(Users::Id).uuid().not_null().primary_key())
                        .col(ColumnDef::new(Users::Email).string().not_null())
                        .col(ColumnDef::new(Users::PasswordHash).string().not_null())
                        .col(ColumnDef::new(Users::Active).boolean().not_null())
                        .col(ColumnDef::new(Users::EmailConfirmedAt).timestamp_with_time_zone())
                        .col(
                            ColumnDef::new(Users::CreatedAt)
                                .timestamp_with_time_zone()
                                .not_null(),
                        )
                        .col(
                            ColumnDef::new(Users::UpdatedAt)
                                .timestamp_with_time_zone()
                                .not_null(),
                        )
                        .to_owned(),
                )
                .await?;

            manager
                .create_index(
                    Index::create()
                        .name("idx_users_email")
                        .table(Users::Table)
                        .col(Users::Email)
                        .unique()
                        .to_owned(),
                )
                .await?;

            manager
                .create_table(
                    Table::create()
                        .table(Profiles::Table)
                        .if_not_exists()
                        .col(ColumnDef::new(Profiles::Id).uuid().not_null().primary_key())
                        .col(ColumnDef::new(Profiles::UserId).uuid().not_null())
                        .col(ColumnDef::new(Profiles::FullName).string().not_null())
                        .col(ColumnDef::new(Profiles::Phone).string().not_null())
                        .col(ColumnDef::new(Profiles::Role).string_len(10).not_null())
                        .col(ColumnDef::new(Profiles::RollNumber).string())
                        .col(ColumnDef::new(Profiles::PhotoUrl).string())
                        .col(ColumnDef::new(Profiles::DateOfBirth).date())
                        .col(ColumnDef::new(Profiles::YearOfStudy).small_integer())
                        .col(ColumnDef::new(Profiles::Branch).string())
                        .col(
                            ColumnDef::new(Profiles::CreatedAt)
                                .timestamp_with_time_zone()
                                .not_null(),
                        )
                        .col(
                            ColumnDef::new(Profiles::UpdatedAt)
                                .timestamp_with_time_zone()
                                .not_null(),
                        )
                        .foreign_key(
                            ForeignKey::create()
                                .name("fk_profiles_user_id")
                                .from(Profiles::Table, Profiles::UserId)
                                .to(Users::Table, Users::Id)
                                .on_delete(ForeignKeyAction::Cascade),
                        )
                        .to_owned(),
                )
                .await?;

            manager
                .create_index(
                    Index::create()
                        .name("idx_profiles_user_id")
                        .table(Profiles::Table)
                        .col(Profiles::UserId)
                        .unique()
                        .to_owned(),
                )
                .await
        }

        async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
            manager
                .drop_table(Table::drop().table(Profiles::Table).to_owned())
                .await?;
            manager
                .drop_table(Table::drop().table(Users::Table).to_owned())
                .await
        }
    }

    #[derive(DeriveIden)]
    enum Users {
        Table,
        Id,
        Email,
        PasswordHash,
        Active,
        EmailConfirmedAt,
        CreatedAt,
        UpdatedAt,
    }

    #[derive(DeriveIden)]
    enum Profiles {
        Table,
        Id,
        UserId,
        FullName,
        Phone,
        Role,
        RollNumber,
        PhotoUrl,
        DateOfBirth,
        YearOfStudy,
        Branch,
        CreatedAt,
        UpdatedAt,
    }
}

mod m20240101_000003_create_carts_table {
    use sea_orm_migration::prelude::*;

    pub struct Migration;

    impl MigrationName for Migration {
        fn name(&self) -> &str {
            "m20240101_000003_create_carts_table"
        }
    }

    #[async_trait::async_trait]
    impl MigrationTrait for Migration {
        async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
            manager
                .create_table(
                    Table::create()
                        .table(Carts::Table)
                        .if_not_exists()
                        .col(ColumnDef::new(Carts::Id).uuid().not_null().primary_key())
                        .col(ColumnDef::new(Carts::SessionKey).string().not_null())
                        .col(ColumnDef::new(Carts::Items).json().not_null())
                        .col(
                            ColumnDef::new(Carts::CreatedAt)
                                .timestamp_with_time_zone()
                                .not_null(),
                        )
                        .col(
                            ColumnDef::new(Carts::UpdatedAt)
                                .timestamp_with_time_zone()
                                .not_null(),
                        )
                        .to_owned(),
                )
                .await?;

            manager
                .create_index(
                    Index::create()
                        .name("idx_carts_session_key")
                        .table(Carts::Table)
                        .col(Carts::SessionKey)
                        .unique()
                        .to_owned(),
                )
                .await
        }

        async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
            manager
                .drop_table(Table::drop().table(Carts::Table).to_owned())
                .await
        }
    }

    #[derive(DeriveIden)]
    enum Carts {
        Table,
        Id,
        SessionKey,
        Items,
        CreatedAt,
        UpdatedAt,
    }
}

mod m20240101_000004_create_orders_table {
    use sea_orm_migration::prelude::*;

    pub struct Migration;

    impl MigrationName for Migration {
        fn name(&self) -> &str {
            "m20240101_000004_create_orders_table"
        }
    }

    #[async_trait::async_trait]
    impl MigrationTrait for Migration {
        async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
            manager
                .create_table(
                    Table::create()
                        .table(Orders::Table)
                        .if_not_exists()
                        .col(ColumnDef::new(Orders::Id).uuid().not_null().primary_key())
                        .col(ColumnDef::new(Orders::OrderNumber).string().not_null())
                        .col(ColumnDef::new(Orders::UserId).uuid().not_null())
                        .col(ColumnDef::new(Orders::Items).json().not_null())
                        .col(
                            ColumnDef::new(Orders::TotalAmount)
                                .decimal_len(19, 4)
                                .not_null(),
                        )
                        .col(ColumnDef::new(Orders::RoomNumber).string().not_null())
                        .col(ColumnDef::new(Orders::ContactNumber).string().not_null())
                        .col(
                            ColumnDef::new(Orders::PaymentMethod)
                                .string_len(10)
                                .not_null(),
                        )
                        .col(ColumnDef::new(Orders::Status).string_len(20).not_null())
                        .col(
                            ColumnDef::new(Orders::PaymentStatus)
                                .string_len(10)
                                .not_null(),
                        )
                        .col(ColumnDef::new(Orders::SpecialInstructions).string())
                        .col(ColumnDef::new(Orders::IsGuest).boolean().not_null())
                        .col(
                            ColumnDef::new(Orders::PlacedAt)
                                .timestamp_with_time_zone()
                                .not_null(),
                        )
                        .col(
                            ColumnDef::new(Orders::UpdatedAt)
                                .timestamp_with_time_zone()
                                .not_null(),
                        )
                        .to_owned(),
                )
                .await?;

            manager
                .create_index(
                    Index::create()
                        .name("idx_orders_order_number")
                        .table(Orders::Table)
                        .col(Orders::OrderNumber)
                        .unique()
                        .to_owned(),
                )
                .await?;

            manager
                .create_index(
                    Index::create()
                        .name("idx_orders_user_id")
                        .table(Orders::Table)
                        .col(Orders::UserId)
                        .to_owned(),
                )
                .await
        }

        async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
            manager
                .drop_table(Table::drop().table(Orders::Table).to_owned())
                .await
        }
    }

    #[derive(DeriveIden)]
    enum Orders {
        Table,
        Id,
        OrderNumber,
        UserId,
        Items,
        TotalAmount,
        RoomNumber,
        ContactNumber,
        PaymentMethod,
        Status,
        PaymentStatus,
        SpecialInstructions,
        IsGuest,
        PlacedAt,
        UpdatedAt,
    }
}

mod m20240101_000005_create_reviews_table {
    use sea_orm_migration::prelude::*;

    pub struct Migration;

    impl MigrationName for Migration {
        fn name(&self) -> &str {
            "m20240101_000005_create_reviews_table"
        }
    }

    #[async_trait::async_trait]
    impl MigrationTrait for Migration {
        async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
            manager
                .create_table(
                    Table::create()
                        .table(Reviews::Table)
                        .if_not_exists()
                        .col(ColumnDef::new(Reviews::Id).uuid().not_null().primary_key())
                        .col(ColumnDef::new(Reviews::UserId).uuid().not_null())
                        .col(ColumnDef::new(Reviews::UserName).string().not_null())
                        .col(ColumnDef::new(Reviews::UserRole).string().not_null())
                        .col(ColumnDef::new(Reviews::ItemName).string().not_null())
                        .col(ColumnDef::new(Reviews::Rating).small_integer().not_null())
                        .col(ColumnDef::new(Reviews::Comment).text().not_null())
                        .col(ColumnDef::new(Reviews::Likes).integer().not_null())
                        .col(
                            ColumnDef::new(Reviews::CreatedAt)
                                .timestamp_with_time_zone()
                                .not_null(),
                        )
                        .to_owned(),
                )
                .await
        }

        async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
            manager
                .drop_table(Table::drop().table(Reviews::Table).to_owned())
                .await
        }
    }

    #[derive(DeriveIden)]
    enum Reviews {
        Table,
        Id,
        UserId,
        UserName,
        UserRole,
        ItemName,
        Rating,
        Comment,
        Likes,
        CreatedAt,
    }
}

mod m20240101_000006_create_password_reset_tokens_table {
    use sea_orm_migration::prelude::*;

    pub struct Migration;

    impl MigrationName for Migration {
        fn name(&self) -> &str {
            "m20240101_000006_create_password_reset_tokens_table"
        }
    }

    #[async_trait::async_trait]
    impl MigrationTrait for Migration {
        async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
            manager
                .create_table(
                    Table::create()
                        .table(PasswordResetTokens::Table)
                        .if_not_exists()
                        .col(
                            ColumnDef::new(PasswordResetTokens::Id)
                                .uuid()
                                .not_null()
                                .primary_key(),
                        )
                        .col(ColumnDef::new(PasswordResetTokens::UserId).uuid().not_null())
                        .col(ColumnDef::new(PasswordResetTokens::Token).string().not_null())
                        .col(
                            ColumnDef::new(PasswordResetTokens::ExpiresAt)
                                .timestamp_with_time_zone()
                                .not_null(),
                        )
                        .col(ColumnDef::new(PasswordResetTokens::Used).boolean().not_null())
                        .col(
                            ColumnDef::new(PasswordResetTokens::CreatedAt)
                                .timestamp_with_time_zone()
                                .not_null(),
                        )
                        .to_owned(),
                )
                .await?;

            manager
                .create_index(
                    Index::create()
                        .name("idx_password_reset_tokens_token")
                        .table(PasswordResetTokens::Table)
                        .col(PasswordResetTokens::Token)
                        .unique()
                        .to_owned(),
                )
                .await
        }

        async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
            manager
                .drop_table(Table::drop().table(PasswordResetTokens::Table).to_owned())
                .await
        }
    }

    #[derive(DeriveIden)]
    enum PasswordResetTokens {
        Table,
        Id,
        UserId,
        Token,
        ExpiresAt,
        Used,
        CreatedAt,
    }
}
