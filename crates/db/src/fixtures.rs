use thiserror::Error;

use crate::connection::DbPool;

#[derive(Debug, Error)]
pub enum SeedError {
    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct SeedResult {
    pub stores: u64,
    pub positions: u64,
    pub items: u64,
}

struct StoreSeed {
    id: i64,
    category: &'static str,
    handle: i64,
    position: Option<(i64, i64, i64)>,
    insert_items: &'static str,
}

/// Demo mall: four stores, one of them without a registered position.
const DEMO_STORES: &[StoreSeed] = &[
    StoreSeed {
        id: 1,
        category: "Roupas",
        handle: 100,
        position: Some((12, 0, -4)),
        insert_items: "INSERT INTO loja_100 (produto, tipo, qtd, preco, tamanho, material, estampa) VALUES \
            ('Camiseta', 'Branca', 10, 45.0, 'M', 'Algodão', 'Sim'), \
            ('Camiseta', 'Verde', 0, 39.9, 'G', 'Algodão', 'Não'), \
            ('Calça', 'Jeans', 6, 189.9, '42', 'Jeans', 'Não'), \
            ('Jaqueta', 'Couro', 2, 280.0, 'M', 'Couro', 'Não'), \
            ('Moletom', 'Cinza', 5, 229.9, 'G', 'Algodão', 'Sim')",
    },
    StoreSeed {
        id: 2,
        category: "Jogos",
        handle: 105,
        position: Some((-8, 0, 15)),
        insert_items: "INSERT INTO loja_105 (produto, tipo, qtd, preco, console) VALUES \
            ('FIFA 24', 'Esporte', 4, 299.9, 'PS5'), \
            ('Zelda Tears of the Kingdom', 'Aventura', 3, 349.0, 'Switch'), \
            ('Forza Horizon 5', 'Corrida', 0, 199.0, 'Xbox Series'), \
            ('Minecraft', 'Sandbox', 12, 99.9, 'Switch')",
    },
    StoreSeed {
        id: 3,
        category: "Calçados",
        handle: 110,
        position: Some((20, 1, 7)),
        insert_items: "INSERT INTO loja_110 (produto, tipo, qtd, preco, tamanho, marca, cor) VALUES \
            ('Tênis', 'Corrida', 8, 399.9, '41', 'Asics', 'Azul'), \
            ('Tênis', 'Casual', 5, 259.0, '40', 'Vans', 'Preto'), \
            ('Sandália', 'Praia', 20, 49.9, '38', 'Havaianas', 'Amarelo')",
    },
    StoreSeed {
        id: 4,
        category: "Livros",
        handle: 120,
        position: None,
        insert_items: "INSERT INTO loja_120 (produto, tipo, qtd, preco, autor, genero, idioma) VALUES \
            ('Dom Casmurro', 'Brochura', 7, 34.9, 'Machado de Assis', 'Romance', 'Português'), \
            ('Dune', 'Capa dura', 2, 129.0, 'Frank Herbert', 'Ficção científica', 'Inglês')",
    },
];

pub struct DemoMall;

impl DemoMall {
    /// Replaces directory, positions and partition rows with the demo data set.
    pub async fn seed(pool: &DbPool) -> Result<SeedResult, SeedError> {
        let mut tx = pool.begin().await?;
        let mut result = SeedResult { stores: 0, positions: 0, items: 0 };

        sqlx::query("DELETE FROM posicao").execute(&mut *tx).await?;
        sqlx::query("DELETE FROM lojas").execute(&mut *tx).await?;

        for store in DEMO_STORES {
            let clear_partition = format!("DELETE FROM loja_{}", store.handle);
            sqlx::query(&clear_partition).execute(&mut *tx).await?;

            result.stores += sqlx::query("INSERT INTO lojas (id, tipo, numero) VALUES (?, ?, ?)")
                .bind(store.id)
                .bind(store.category)
                .bind(store.handle)
                .execute(&mut *tx)
                .await?
                .rows_affected();

            if let Some((x, y, z)) = store.position {
                result.positions +=
                    sqlx::query("INSERT INTO posicao (numero, x, y, z) VALUES (?, ?, ?, ?)")
                        .bind(store.handle)
                        .bind(x)
                        .bind(y)
                        .bind(z)
                        .execute(&mut *tx)
                        .await?
                        .rows_affected();
            }

            result.items +=
                sqlx::query(store.insert_items).execute(&mut *tx).await?.rows_affected();
        }

        tx.commit().await?;
        Ok(result)
    }
}

#[cfg(test)]
mod tests {
    use super::DemoMall;
    use crate::{connect_with_settings, migrations};

    #[tokio::test]
    async fn seed_is_repeatable() {
        let pool = connect_with_settings("sqlite::memory:", 1, 30).await.expect("connect");
        migrations::run_pending(&pool).await.expect("migrate");

        let first = DemoMall::seed(&pool).await.expect("first seed");
        let second = DemoMall::seed(&pool).await.expect("second seed");

        assert_eq!(first, second);
        assert_eq!(first.stores, 4);
        assert_eq!(first.positions, 3);
        assert_eq!(first.items, 14);

        let (count,): (i64,) =
            sqlx::query_as("SELECT COUNT(*) FROM loja_100").fetch_one(&pool).await.expect("count");
        assert_eq!(count, 5);
        pool.close().await;
    }
}
