use anyhow::bail;
use clap::{Parser, Subcommand};

use crate::auth::password;
use crate::config::AppConfig;
use crate::db::session::SessionFactory;
use crate::models::{tenant, user};
use crate::tenancy;

#[derive(Parser)]
#[command(name = "latticectl")]
#[command(about = "Provisioning CLI for the lattice tenant/user directory")]
#[command(version)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    #[command(about = "Register a tenant in the shared directory")]
    AddTenant {
        #[arg(short = 't', long, help = "Name of the tenant to add")]
        name: String,

        #[arg(short, long, help = "Physical schema owned by the tenant")]
        schema: String,

        #[arg(short, long, default_value_t = true, help = "Whether the tenant starts active")]
        active: bool,

        #[arg(long, default_value_t = false, help = "Mark this tenant as the default")]
        default_tenant: bool,
    },

    #[command(about = "Create a user under an existing tenant")]
    AddUser {
        #[arg(short = 'u', long, help = "Login name of the user to add")]
        name: String,

        #[arg(short, long, help = "Plaintext password, hashed before storage")]
        password: String,

        #[arg(short, long, help = "Name of the tenant the user belongs to")]
        tenant: String,

        #[arg(short, long)]
        email: String,
    },

    #[command(about = "List active tenants")]
    ListTenants,

    #[command(about = "List a tenant's active users")]
    ListUsers {
        #[arg(short = 't', long, help = "Name of the tenant")]
        tenant: String,
    },

    #[command(about = "Soft-delete a tenant")]
    RemoveTenant {
        #[arg(short = 't', long)]
        name: String,
    },

    #[command(about = "Soft-delete a user")]
    RemoveUser {
        #[arg(short = 'u', long)]
        name: String,
    },

    #[command(about = "Probe every tenant schema through a routed session")]
    CheckSchemas,
}

pub async fn run(cli: Cli, config: &AppConfig) -> anyhow::Result<()> {
    let sessions = SessionFactory::new(&config.database)?;

    match cli.command {
        Commands::AddTenant {
            name,
            schema,
            active,
            default_tenant,
        } => {
            let created = sessions
                .with_shared(move |conn| {
                    Box::pin(async move {
                        tenant::insert(conn, &name, &schema, active, default_tenant)
                            .await
                            .map_err(anyhow::Error::from)
                    })
                })
                .await?;

            println!(
                "tenant {} (id {}) -> schema {}",
                created.name, created.record.id, created.schema
            );
        }

        Commands::AddUser {
            name,
            password,
            tenant: tenant_name,
            email,
        } => {
            let password_hash = password::hash(&password).await?;

            let created = sessions
                .with_shared(move |conn| {
                    Box::pin(async move {
                        let Some(parent) = tenant::find_by_name(conn, &tenant_name).await? else {
                            bail!("no such tenant: {tenant_name}")
                        };
                        user::insert(conn, parent.record.id, &name, &password_hash, &email, true)
                            .await
                            .map_err(anyhow::Error::from)
                    })
                })
                .await?;

            println!("user {} (id {}) added", created.name, created.record.id);
        }

        Commands::ListTenants => {
            let tenants = sessions
                .with_shared(|conn| {
                    Box::pin(async move {
                        tenant::list_active(conn).await.map_err(anyhow::Error::from)
                    })
                })
                .await?;

            for t in &tenants {
                println!(
                    "{:>6}  {}  schema={} default={}",
                    t.record.id, t.name, t.schema, t.default_tenant
                );
            }
        }

        Commands::ListUsers { tenant: tenant_name } => {
            let users = sessions
                .with_shared(move |conn| {
                    Box::pin(async move {
                        let Some(parent) = tenant::find_by_name(conn, &tenant_name).await? else {
                            bail!("no such tenant: {tenant_name}")
                        };
                        user::list_active(conn, parent.record.id)
                            .await
                            .map_err(anyhow::Error::from)
                    })
                })
                .await?;

            for u in &users {
                println!("{:>6}  {}  email={}", u.record.id, u.name, u.email);
            }
        }

        Commands::RemoveTenant { name } => {
            let removed = sessions
                .with_shared(move |conn| {
                    Box::pin(async move {
                        let Some(mut t) = tenant::find_by_name(conn, &name).await? else {
                            bail!("no such tenant: {name}")
                        };
                        tenant::soft_delete(conn, &mut t).await?;
                        Ok(t)
                    })
                })
                .await?;

            println!("tenant {} soft-deleted", removed.name);
        }

        Commands::RemoveUser { name } => {
            let removed = sessions
                .with_shared(move |conn| {
                    Box::pin(async move {
                        let Some(mut u) = user::find_by_name(conn, &name).await? else {
                            bail!("no such user: {name}")
                        };
                        user::soft_delete(conn, &mut u).await?;
                        Ok(u)
                    })
                })
                .await?;

            println!("user {} soft-deleted", removed.name);
        }

        Commands::CheckSchemas => {
            let schemas = sessions
                .with_shared(|conn| {
                    Box::pin(async move {
                        tenant::schema_names(conn).await.map_err(anyhow::Error::from)
                    })
                })
                .await?;

            tenancy::for_each_tenant_schema(&sessions, &schemas, |schema, conn| {
                Box::pin(async move {
                    sqlx::query("SELECT 1").execute(conn).await?;
                    println!("schema {schema}: ok");
                    Ok(())
                })
            })
            .await?;

            println!("{} tenant schemas reachable", schemas.len());
        }
    }

    Ok(())
}
